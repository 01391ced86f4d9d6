//! End-to-end tests for the backend lowering pipeline: HIR check, register
//! allocation, MIR check.

mod common;

use cinder_driver::pipeline::{execute_lowering_pipeline, PipelineError, PipelineOptions};
use cinder_ir::build::ProcedureBuilder;
use cinder_ir::cfg::Terminator;
use cinder_ir::instr::{Instr, Opcode};
use cinder_ir::operand::Operand;
use cinder_ir::ty::Type;
use cinder_macros::{assert_err, assert_matches, assert_ok};
use common::{block_proc, module_with};

fn ret() -> Terminator {
    Terminator::Return(Vec::new())
}

fn opts(num_registers: usize) -> PipelineOptions {
    PipelineOptions { num_registers }
}

#[test]
fn test_lowers_identity_procedure() {
    let proc = block_proc(
        ProcedureBuilder::new("f").arg("x", Type::I64).ret(Type::I64),
        vec![
            Instr::load(
                Type::I64,
                Operand::caller_interproc(0, Type::I64),
                Operand::temp(0, Type::I64),
            ),
            Instr::store(
                Type::I64,
                Operand::temp(0, Type::I64),
                Operand::caller_interproc(0, Type::I64),
            ),
        ],
        Terminator::Return(vec![Operand::temp(0, Type::I64)]),
    );
    let mut module = module_with(vec![proc]);
    assert_ok!(execute_lowering_pipeline(&mut module, &opts(4)));

    let proc = module.procedure("f").unwrap();
    assert_eq!(
        proc.block(proc.start).code[0].destinations[0],
        Operand::register(0, Type::I64)
    );
    assert_eq!(proc.spill_region_size, 0);
}

#[test]
fn test_lowers_call_round_trip() {
    let callee = block_proc(
        ProcedureBuilder::new("f")
            .arg("a", Type::I32)
            .arg("b", Type::I32)
            .ret(Type::I32),
        vec![
            Instr::load(
                Type::I32,
                Operand::caller_interproc(0, Type::I32),
                Operand::temp(0, Type::I32),
            ),
            Instr::load(
                Type::I32,
                Operand::caller_interproc(1, Type::I32),
                Operand::temp(1, Type::I32),
            ),
            Instr::binary(
                Opcode::Add,
                Type::I32,
                Operand::temp(0, Type::I32),
                Operand::temp(1, Type::I32),
                Operand::temp(2, Type::I32),
            ),
            Instr::store(
                Type::I32,
                Operand::temp(2, Type::I32),
                Operand::caller_interproc(0, Type::I32),
            ),
        ],
        Terminator::Return(vec![Operand::temp(2, Type::I32)]),
    );
    let caller = block_proc(
        ProcedureBuilder::new("g").ret(Type::I32),
        vec![
            Instr::store(
                Type::I32,
                Operand::lit(7, Type::I32),
                Operand::callee_interproc(0, Type::I32),
            ),
            Instr::store(
                Type::I32,
                Operand::lit(9, Type::I32),
                Operand::callee_interproc(1, Type::I32),
            ),
            Instr::call(
                Operand::proc_ref("f"),
                vec![Operand::lit(7, Type::I32), Operand::lit(9, Type::I32)],
                vec![Operand::temp(0, Type::I32)],
            ),
            Instr::load(
                Type::I32,
                Operand::callee_interproc(0, Type::I32),
                Operand::temp(1, Type::I32),
            ),
            Instr::store(
                Type::I32,
                Operand::temp(1, Type::I32),
                Operand::caller_interproc(0, Type::I32),
            ),
        ],
        Terminator::Return(vec![Operand::temp(1, Type::I32)]),
    );
    let mut module = module_with(vec![callee, caller]);
    assert_ok!(execute_lowering_pipeline(&mut module, &opts(4)));

    // the MIR call carries only its callee reference
    let caller = module.procedure("g").unwrap();
    let call = &caller.block(caller.start).code[2];
    assert_eq!(call.operands, vec![Operand::proc_ref("f")]);
    assert!(call.destinations.is_empty());
}

#[test]
fn test_lowers_under_register_pressure() {
    let proc = block_proc(
        ProcedureBuilder::new("p")
            .local("a", Type::I64)
            .local("b", Type::I64)
            .local("c", Type::I64),
        vec![
            Instr::load(
                Type::I64,
                Operand::local(0, Type::I64),
                Operand::temp(0, Type::I64),
            ),
            Instr::load(
                Type::I64,
                Operand::local(1, Type::I64),
                Operand::temp(1, Type::I64),
            ),
            Instr::load(
                Type::I64,
                Operand::local(2, Type::I64),
                Operand::temp(2, Type::I64),
            ),
            Instr::store(
                Type::I64,
                Operand::temp(0, Type::I64),
                Operand::local(0, Type::I64),
            ),
            Instr::store(
                Type::I64,
                Operand::temp(1, Type::I64),
                Operand::local(1, Type::I64),
            ),
            Instr::store(
                Type::I64,
                Operand::temp(2, Type::I64),
                Operand::local(2, Type::I64),
            ),
        ],
        ret(),
    );
    let mut module = module_with(vec![proc]);
    assert_ok!(execute_lowering_pipeline(&mut module, &opts(1)));

    let proc = module.procedure("p").unwrap();
    let spills = proc
        .block(proc.start)
        .code
        .iter()
        .filter(|instr| instr.op == Opcode::StoreSpill)
        .count();
    assert!(spills >= 2, "expected at least two spills, found {}", spills);
    assert_eq!(proc.spill_region_size, 3);
}

#[test]
fn test_rejects_malformed_hir() {
    let proc = block_proc(
        ProcedureBuilder::new("p"),
        vec![Instr::binary(
            Opcode::Add,
            Type::I32,
            Operand::lit(1, Type::I32),
            Operand::lit(2, Type::I64),
            Operand::temp(0, Type::I32),
        )],
        ret(),
    );
    let mut module = module_with(vec![proc]);
    let err = assert_err!(execute_lowering_pipeline(&mut module, &opts(4)));
    assert_matches!(err, PipelineError::Hir(_) => ());
}

#[test]
fn test_rejects_return_that_was_never_staged() {
    // well-formed HIR, but nothing stores the returned value into the
    // caller-interproc region; the MIR checker is the backstop
    let proc = block_proc(
        ProcedureBuilder::new("r").ret(Type::I64),
        vec![],
        Terminator::Return(vec![Operand::lit(42, Type::I64)]),
    );
    let mut module = module_with(vec![proc]);
    let err = assert_err!(execute_lowering_pipeline(&mut module, &opts(4)));
    assert_matches!(err, PipelineError::Mir(_) => ());
}
