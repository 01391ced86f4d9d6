//! Builder API for constructing IR.
//!
//! Upstream lowering and the test suites build modules through these types
//! rather than assembling the structs by hand.

use crate::cfg::{BasicBlock, BlockId, ProcParam, Procedure, Terminator};
use crate::instr::Instr;
use crate::ty::Type;
use crate::{DataSymbol, Module, Symbol};

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module::new(name),
        }
    }

    pub fn procedure(mut self, proc: Procedure) -> Self {
        self.module
            .globals
            .insert(proc.name.clone(), Symbol::Procedure(proc));
        self
    }

    pub fn data(mut self, name: impl Into<String>, size: usize) -> Self {
        let name = name.into();
        self.module
            .globals
            .insert(name.clone(), Symbol::Data(DataSymbol { name, size }));
        self
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

/// Builds one procedure. Blocks are created up front so terminators can refer
/// to them by id; a fresh block defaults to an empty return until
/// [`ProcedureBuilder::terminate`] is called.
pub struct ProcedureBuilder {
    proc: Procedure,
}

impl ProcedureBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proc: Procedure {
                name: name.into(),
                args: Vec::new(),
                rets: Vec::new(),
                locals: Vec::new(),
                start: BlockId(0),
                blocks: Vec::new(),
                spill_region_size: 0,
            },
        }
    }

    pub fn arg(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.proc.args.push(ProcParam {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn ret(mut self, ty: Type) -> Self {
        self.proc.rets.push(ty);
        self
    }

    pub fn local(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.proc.locals.push(ProcParam {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.proc.blocks.len());
        self.proc.blocks.push(BasicBlock::new(label));
        id
    }

    pub fn push(&mut self, block: BlockId, instr: Instr) {
        self.proc.blocks[block.0].code.push(instr);
    }

    pub fn terminate(&mut self, block: BlockId, terminator: Terminator) {
        self.proc.blocks[block.0].terminator = terminator;
    }

    pub fn finish(self) -> Procedure {
        self.proc
    }
}
