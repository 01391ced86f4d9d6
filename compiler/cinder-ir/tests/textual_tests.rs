//! Snapshot tests for the textual emission pass.

use cinder_ir::build::{ModuleBuilder, ProcedureBuilder};
use cinder_ir::cfg::Terminator;
use cinder_ir::instr::Instr;
use cinder_ir::operand::Operand;
use cinder_ir::textual_pass::ModuleTextualPass;
use cinder_ir::ty::Type;

#[test]
fn test_render_identity_procedure() {
    let mut f = ProcedureBuilder::new("f").arg("x", Type::I64).ret(Type::I64);
    let entry = f.block("entry");
    f.push(
        entry,
        Instr::load(
            Type::I64,
            Operand::caller_interproc(0, Type::I64),
            Operand::temp(0, Type::I64),
        ),
    );
    f.push(
        entry,
        Instr::store(
            Type::I64,
            Operand::temp(0, Type::I64),
            Operand::caller_interproc(0, Type::I64),
        ),
    );
    f.terminate(entry, Terminator::Return(vec![Operand::temp(0, Type::I64)]));
    let module = ModuleBuilder::new("m").procedure(f.finish()).finish();

    let text = ModuleTextualPass::format_module_to_string(&module);
    insta::assert_snapshot!(text, @r###"
    module m {
      proc f(x: i64) -> (i64) {
        entry:
          load:i64 %caller0:i64 -> %t0:i64
          store:i64 %t0:i64 -> %caller0:i64
          ret %t0:i64
      }
    }
    "###);
}

#[test]
fn test_render_data_symbol() {
    let module = ModuleBuilder::new("empty").data("buf", 16).finish();
    let text = ModuleTextualPass::format_module_to_string(&module);
    insta::assert_snapshot!(text, @r###"
    module empty {
      data buf[16]
    }
    "###);
}
