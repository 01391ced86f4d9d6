use cinder_ir::build::{ModuleBuilder, ProcedureBuilder};
use cinder_ir::cfg::{Procedure, Terminator};
use cinder_ir::instr::Instr;
use cinder_ir::Module;

/// Build a module named `test` holding the given procedures.
pub fn module_with(procs: Vec<Procedure>) -> Module {
    let mut builder = ModuleBuilder::new("test");
    for proc in procs {
        builder = builder.procedure(proc);
    }
    builder.finish()
}

/// Finish a procedure with a single `entry` block of straight-line code.
pub fn block_proc(
    mut builder: ProcedureBuilder,
    code: Vec<Instr>,
    terminator: Terminator,
) -> Procedure {
    let entry = builder.block("entry");
    for instr in code {
        builder.push(entry, instr);
    }
    builder.terminate(entry, terminator);
    builder.finish()
}
