//! Tests for the register allocation pass.

mod common;

use cinder_ir::build::ProcedureBuilder;
use cinder_ir::cfg::Terminator;
use cinder_ir::instr::{Instr, Opcode};
use cinder_ir::operand::{Operand, OperandClass};
use cinder_ir::ty::Type;
use cinder_ir::Module;
use cinder_macros::assert_matches;
use cinder_mir::regalloc::RegisterAllocator;
use common::{block_proc, module_with};

fn ret() -> Terminator {
    Terminator::Return(Vec::new())
}

/// One argument of type i64, loaded and staged back as the return value.
fn identity_module() -> Module {
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
    module_with(vec![proc])
}

/// Three locals loaded into three temporaries, which are then read in the
/// same order.
fn pressure_module(tys: [Type; 3]) -> Module {
    let proc = block_proc(
        ProcedureBuilder::new("p")
            .local("a", tys[0])
            .local("b", tys[1])
            .local("c", tys[2]),
        vec![
            Instr::load(tys[0], Operand::local(0, tys[0]), Operand::temp(0, tys[0])),
            Instr::load(tys[1], Operand::local(1, tys[1]), Operand::temp(1, tys[1])),
            Instr::load(tys[2], Operand::local(2, tys[2]), Operand::temp(2, tys[2])),
            Instr::store(tys[0], Operand::temp(0, tys[0]), Operand::local(0, tys[0])),
            Instr::store(tys[1], Operand::temp(1, tys[1]), Operand::local(1, tys[1])),
            Instr::store(tys[2], Operand::temp(2, tys[2]), Operand::local(2, tys[2])),
        ],
        ret(),
    );
    module_with(vec![proc])
}

#[test]
fn test_identity_gets_register_zero() {
    let mut module = identity_module();
    RegisterAllocator::new(4).allocate(&mut module);

    let proc = module.procedure("f").unwrap();
    let block = proc.block(proc.start);
    assert_eq!(block.code.len(), 2);
    assert_eq!(
        block.code[0].destinations[0],
        Operand::register(0, Type::I64)
    );
    assert_eq!(block.code[1].operands[0], Operand::register(0, Type::I64));
    assert_matches!(&block.terminator, Terminator::Return(values) => assert!(values.is_empty()));
    assert_eq!(proc.spill_region_size, 0);
}

#[test]
fn test_spills_when_register_file_is_exhausted() {
    let mut module = pressure_module([Type::I64; 3]);
    RegisterAllocator::new(1).allocate(&mut module);

    let proc = module.procedure("p").unwrap();
    let code = &proc.block(proc.start).code;
    let ops = code.iter().map(|instr| instr.op).collect::<Vec<_>>();
    assert_eq!(
        ops,
        vec![
            Opcode::Load,
            Opcode::StoreSpill,
            Opcode::Load,
            Opcode::StoreSpill,
            Opcode::Load,
            Opcode::StoreSpill,
            Opcode::LoadSpill,
            Opcode::Store,
            Opcode::LoadSpill,
            Opcode::Store,
            Opcode::LoadSpill,
            Opcode::Store,
        ]
    );
    // every reload reads the slot its value was spilled to
    assert_eq!(code[1].destinations[0], Operand::spill(0, Type::I64));
    assert_eq!(code[6].operands[0], Operand::spill(0, Type::I64));
    assert_eq!(code[3].destinations[0], Operand::spill(1, Type::I64));
    assert_eq!(code[8].operands[0], Operand::spill(1, Type::I64));
    assert_eq!(code[5].destinations[0], Operand::spill(2, Type::I64));
    assert_eq!(code[10].operands[0], Operand::spill(2, Type::I64));
    assert_eq!(proc.spill_region_size, 3);
}

#[test]
fn test_no_register_exceeds_the_budget() {
    let mut module = pressure_module([Type::I64; 3]);
    RegisterAllocator::new(2).allocate(&mut module);

    let proc = module.procedure("p").unwrap();
    for instr in &proc.block(proc.start).code {
        for op in instr.operands.iter().chain(&instr.destinations) {
            if op.class == OperandClass::Register {
                assert!(op.num < 2, "register {} out of budget in {}", op.num, instr);
            }
        }
    }
    assert_eq!(proc.spill_region_size, 1);
}

#[test]
fn test_evicts_the_furthest_next_use() {
    // t0 is read later than t1, so defining t2 must evict t0
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
                Operand::temp(1, Type::I64),
                Operand::local(1, Type::I64),
            ),
            Instr::store(
                Type::I64,
                Operand::temp(0, Type::I64),
                Operand::local(0, Type::I64),
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
    RegisterAllocator::new(2).allocate(&mut module);

    let proc = module.procedure("p").unwrap();
    let code = &proc.block(proc.start).code;
    let ops = code.iter().map(|instr| instr.op).collect::<Vec<_>>();
    assert_eq!(
        ops,
        vec![
            Opcode::Load,
            Opcode::Load,
            Opcode::StoreSpill,
            Opcode::Load,
            Opcode::Store,
            Opcode::LoadSpill,
            Opcode::Store,
            Opcode::Store,
        ]
    );
    // the victim is t0's register, not t1's
    assert_eq!(code[2].operands[0], Operand::register(0, Type::I64));
    assert_eq!(code[2].destinations[0], Operand::spill(0, Type::I64));
    assert_eq!(code[5].operands[0], Operand::spill(0, Type::I64));
    assert_eq!(code[5].destinations[0], Operand::register(1, Type::I64));
    // a single spill: the MIN bound for two registers over this block
    let spills = ops.iter().filter(|op| **op == Opcode::StoreSpill).count();
    assert_eq!(spills, 1);
}

#[test]
fn test_allocation_preserves_operand_types() {
    let mut module = pressure_module([Type::I64, Type::I32, Type::Bool]);
    let original = module.clone();
    RegisterAllocator::new(1).allocate(&mut module);

    let proc = module.procedure("p").unwrap();
    let original_proc = original.procedure("p").unwrap();
    let rewritten = proc
        .block(proc.start)
        .code
        .iter()
        .filter(|instr| !matches!(instr.op, Opcode::LoadSpill | Opcode::StoreSpill))
        .collect::<Vec<_>>();
    let original_code = &original_proc.block(original_proc.start).code;
    assert_eq!(rewritten.len(), original_code.len());
    for (after, before) in rewritten.iter().zip(original_code) {
        assert_eq!(after.op, before.op);
        assert_eq!(after.ty, before.ty);
        for (a, b) in after.operands.iter().zip(&before.operands) {
            assert_eq!(a.ty, b.ty);
        }
        for (a, b) in after.destinations.iter().zip(&before.destinations) {
            assert_eq!(a.ty, b.ty);
        }
    }
}

#[test]
fn test_call_keeps_only_its_callee_reference() {
    let callee = block_proc(
        ProcedureBuilder::new("f").arg("a", Type::I32),
        vec![],
        ret(),
    );
    let caller = block_proc(
        ProcedureBuilder::new("g"),
        vec![
            Instr::store(
                Type::I32,
                Operand::lit(7, Type::I32),
                Operand::callee_interproc(0, Type::I32),
            ),
            Instr::call(
                Operand::proc_ref("f"),
                vec![Operand::lit(7, Type::I32)],
                vec![],
            ),
        ],
        ret(),
    );
    let mut module = module_with(vec![callee, caller]);
    RegisterAllocator::new(4).allocate(&mut module);

    let proc = module.procedure("g").unwrap();
    let call = &proc.block(proc.start).code[1];
    assert_eq!(call.op, Opcode::Call);
    assert_eq!(call.operands, vec![Operand::proc_ref("f")]);
    assert!(call.destinations.is_empty());
}

#[test]
fn test_branch_condition_is_rewritten() {
    let mut builder = ProcedureBuilder::new("p").local("c", Type::Bool);
    let entry = builder.block("entry");
    let yes = builder.block("yes");
    let no = builder.block("no");
    builder.push(
        entry,
        Instr::load(
            Type::Bool,
            Operand::local(0, Type::Bool),
            Operand::temp(0, Type::Bool),
        ),
    );
    builder.terminate(
        entry,
        Terminator::Branch {
            cond: Operand::temp(0, Type::Bool),
            true_target: yes,
            false_target: no,
        },
    );
    builder.terminate(yes, ret());
    builder.terminate(no, ret());
    let mut module = module_with(vec![builder.finish()]);
    RegisterAllocator::new(2).allocate(&mut module);

    let proc = module.procedure("p").unwrap();
    assert_matches!(
        &proc.block(proc.start).terminator,
        Terminator::Branch { cond, .. } => assert_eq!(*cond, Operand::register(0, Type::Bool))
    );
}

#[test]
fn test_store_through_pointer_is_reshaped() {
    let proc = block_proc(
        ProcedureBuilder::new("p")
            .local("slot", Type::Ptr)
            .local("v", Type::I64),
        vec![
            Instr::load(
                Type::Ptr,
                Operand::local(0, Type::Ptr),
                Operand::temp(0, Type::Ptr),
            ),
            Instr::load(
                Type::I64,
                Operand::local(1, Type::I64),
                Operand::temp(1, Type::I64),
            ),
            Instr::store_ptr(
                Type::I64,
                Operand::temp(1, Type::I64),
                Operand::temp(0, Type::Ptr),
            ),
        ],
        ret(),
    );
    let mut module = module_with(vec![proc]);
    RegisterAllocator::new(2).allocate(&mut module);

    let proc = module.procedure("p").unwrap();
    let store = &proc.block(proc.start).code[2];
    assert_eq!(store.op, Opcode::StorePtr);
    assert!(store.destinations.is_empty());
    assert_eq!(
        store.operands,
        vec![
            Operand::register(1, Type::I64),
            Operand::register(0, Type::Ptr),
        ]
    );
}
