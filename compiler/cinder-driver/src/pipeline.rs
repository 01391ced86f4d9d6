use cinder_hir::check::HirWellFormednessPass;
use cinder_hir::error::HirCheckError;
use cinder_ir::Module;
use cinder_mir::check::MirWellFormednessPass;
use cinder_mir::error::MirCheckError;
use cinder_mir::regalloc::RegisterAllocator;
use miette::Diagnostic;
use thiserror::Error;

/// Execute the backend lowering pipeline over a single module.
///
/// The module comes in as HIR and leaves as MIR: it is checked, every
/// temporary is rewritten to a physical location, and the result is checked
/// again. The first diagnostic aborts the pipeline.
pub fn execute_lowering_pipeline(
    module: &mut Module,
    opts: &PipelineOptions,
) -> Result<(), PipelineError> {
    HirWellFormednessPass::visit(module)?;
    let allocator = RegisterAllocator::new(opts.num_registers);
    allocator.allocate(module);
    MirWellFormednessPass::visit(module)?;
    Ok(())
}

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Hir(#[from] HirCheckError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Mir(#[from] MirCheckError),
}

/// Options for the lowering pipeline.
pub struct PipelineOptions {
    /// Register count of the target machine. Must be at least one.
    pub num_registers: usize,
}
