//! The MIR well-formedness pass.
//!
//! Beyond the per-opcode class and type rules, the pass simulates the
//! dataflow through the three storage regions along a depth-first traversal
//! of the control-flow graph. On procedure entry the caller-interproc region
//! holds the formal arguments, as if spilled by the caller; stores write
//! region slots, loads demand a type-matching value, calls consume their
//! staged arguments and publish their returns, and a return terminator
//! consumes the staged return values.
//!
//! Region states are not merged at join points: a block inherits the state of
//! its first-discovered predecessor and later visits are skipped by the
//! visited flag. Programs whose joins see divergent region states are checked
//! against only one of them.

use crate::error::{
    BadArgumentError, BadReturnError, EmptyReturnSlotError, InvalidClassError, LoadingGarbageError,
    MalformedInstructionError, MalformedOperandError, MirCheckError, MirCheckResult,
    ProcedureNotFoundError, UnequalTypesError,
};
use crate::region::Region;
use cinder_ir::cfg::{BlockId, Procedure, Terminator};
use cinder_ir::instr::{Instr, Opcode};
use cinder_ir::operand::{Operand, OperandClass, SymbolRef};
use cinder_ir::ty::Type;
use cinder_ir::{Module, Symbol};

/// A class predicate paired with a type predicate. An operand satisfies the
/// rule iff both hold.
struct OperandRule {
    class: fn(OperandClass) -> bool,
    ty: fn(Type) -> bool,
}

impl OperandRule {
    fn check(&self, op: &Operand) -> bool {
        (self.ty)(op.ty) && (self.class)(op.class)
    }
}

const BASIC_OR_PROC_IMME: OperandRule = OperandRule {
    class: OperandClass::is_immediate,
    ty: Type::is_basic_or_proc,
};
const BASIC_OR_PROC_REG: OperandRule = OperandRule {
    class: OperandClass::is_register,
    ty: Type::is_basic_or_proc,
};
const BASIC_OR_PROC_ADDR: OperandRule = OperandRule {
    class: OperandClass::is_addressable,
    ty: Type::is_basic_or_proc,
};
const BASIC_IMME: OperandRule = OperandRule {
    class: OperandClass::is_immediate,
    ty: Type::is_basic,
};
const BASIC_REG: OperandRule = OperandRule {
    class: OperandClass::is_register,
    ty: Type::is_basic,
};
const NUM_IMME: OperandRule = OperandRule {
    class: OperandClass::is_immediate,
    ty: Type::is_number,
};
const NUM_REG: OperandRule = OperandRule {
    class: OperandClass::is_register,
    ty: Type::is_number,
};
const BOOL_IMME: OperandRule = OperandRule {
    class: OperandClass::is_immediate,
    ty: Type::is_bool,
};
const BOOL_REG: OperandRule = OperandRule {
    class: OperandClass::is_register,
    ty: Type::is_bool,
};
const PTR_IMME: OperandRule = OperandRule {
    class: OperandClass::is_immediate,
    ty: Type::is_ptr,
};
const PTR_REG: OperandRule = OperandRule {
    class: OperandClass::is_register,
    ty: Type::is_ptr,
};

/// Validates the register allocator's output: per-instruction operand class
/// rules and the dataflow through the caller-interproc, callee-interproc and
/// spill regions.
pub struct MirWellFormednessPass;

impl MirWellFormednessPass {
    pub fn visit(module: &Module) -> MirCheckResult<()> {
        for symbol in module.globals.values() {
            if let Symbol::Procedure(proc) = symbol {
                proc.reset_visited();
                let mut cx = CheckContext::new(module, proc);
                cx.init_args();
                cx.visit_block(proc.start)?;
            }
        }
        Ok(())
    }
}

struct CheckContext<'m> {
    module: &'m Module,
    proc: &'m Procedure,
    callee_interproc: Region,
    caller_interproc: Region,
    spill: Region,
}

impl<'m> CheckContext<'m> {
    fn new(module: &'m Module, proc: &'m Procedure) -> Self {
        Self {
            module,
            proc,
            callee_interproc: Region::new(),
            caller_interproc: Region::new(),
            spill: Region::new(),
        }
    }

    /// Populate the caller-interproc region with the formal arguments, as if
    /// the caller had stored them before the call.
    fn init_args(&mut self) {
        for (index, arg) in self.proc.args.iter().enumerate() {
            let op = Operand::caller_interproc(index, arg.ty).with_symbol(SymbolRef::Arg(index));
            self.caller_interproc.store(index, op);
        }
    }

    fn visit_block(&mut self, id: BlockId) -> MirCheckResult<()> {
        let proc = self.proc;
        let block = proc.block(id);
        if block.visited.get() {
            return Ok(());
        }
        for instr in &block.code {
            self.visit_instr(instr)?;
        }
        block.visited.set(true);
        match &block.terminator {
            Terminator::Jump(target) => self.visit_block(*target),
            Terminator::Branch {
                true_target,
                false_target,
                ..
            } => {
                self.visit_block(*true_target)?;
                self.visit_block(*false_target)
            }
            Terminator::Return(_) => self.visit_return(),
        }
    }

    /// A MIR return carries no operands: each formal return must be staged
    /// in its caller-interproc slot, which is consumed by the check.
    fn visit_return(&mut self) -> MirCheckResult<()> {
        let proc = self.proc;
        for (index, ret) in proc.rets.iter().enumerate() {
            let Some(op) = self.caller_interproc.load(index) else {
                return Err(EmptyReturnSlotError {
                    index,
                    proc: proc.name.clone(),
                }
                .into());
            };
            if op.ty != *ret {
                return Err(BadReturnError {
                    formal: ret.to_string(),
                    slot: op.to_string(),
                }
                .into());
            }
            self.caller_interproc.clear(index);
        }
        Ok(())
    }

    fn visit_instr(&mut self, instr: &Instr) -> MirCheckResult<()> {
        check_invalid_class(instr)?;
        match instr.op {
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Rem => {
                check_arith(instr)
            }
            Opcode::Eq | Opcode::Diff | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge => {
                check_compare(instr)
            }
            Opcode::And | Opcode::Or => check_logical(instr),
            Opcode::Not => check_not(instr),
            Opcode::Neg | Opcode::Pos => check_unary_arith(instr),
            Opcode::Convert => check_convert(instr),
            Opcode::Offset => check_offset(instr),
            Opcode::LoadPtr => check_load_ptr(instr),
            Opcode::StorePtr => check_store_ptr(instr),
            Opcode::Load | Opcode::LoadSpill => self.check_load(instr),
            Opcode::Store | Opcode::StoreSpill => self.check_store(instr),
            Opcode::Copy => check_copy(instr),
            Opcode::Call => self.check_call(instr),
        }
    }

    fn check_load(&mut self, instr: &Instr) -> MirCheckResult<()> {
        check_form(instr, 1, 1)?;
        let a = &instr.operands[0];
        let dest = &instr.destinations[0];
        check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
        check_unary(instr, &BASIC_OR_PROC_ADDR, &BASIC_OR_PROC_REG)?;
        self.check_load_state(instr)
    }

    fn check_load_state(&mut self, instr: &Instr) -> MirCheckResult<()> {
        let a = &instr.operands[0];
        let dest = &instr.destinations[0];
        let source = match a.class {
            OperandClass::Spill => self.spill.load(slot_index(instr, a)?).cloned(),
            OperandClass::CalleeInterproc => {
                self.callee_interproc.load(slot_index(instr, a)?).cloned()
            }
            OperandClass::CallerInterproc => {
                self.caller_interproc.load(slot_index(instr, a)?).cloned()
            }
            // a named local always holds its declared value
            OperandClass::Local => Some(self.local_operand(instr, a)?),
            _ => None,
        };
        let Some(source) = source else {
            return Err(LoadingGarbageError {
                instr: instr.to_string(),
            }
            .into());
        };
        check_equal(instr, &[dest.ty, source.ty])
    }

    fn check_store(&mut self, instr: &Instr) -> MirCheckResult<()> {
        check_form(instr, 1, 1)?;
        let a = &instr.operands[0];
        let dest = &instr.destinations[0];
        check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
        check_unary(instr, &BASIC_OR_PROC_IMME, &BASIC_OR_PROC_ADDR)?;
        self.check_store_state(instr)
    }

    fn check_store_state(&mut self, instr: &Instr) -> MirCheckResult<()> {
        let source = instr.operands[0].clone();
        let dest = &instr.destinations[0];
        match dest.class {
            OperandClass::Spill => {
                let index = slot_index(instr, dest)?;
                self.spill.store(index, source);
            }
            OperandClass::CalleeInterproc => {
                let index = slot_index(instr, dest)?;
                self.callee_interproc.store(index, source);
            }
            OperandClass::CallerInterproc => {
                let index = slot_index(instr, dest)?;
                self.caller_interproc.store(index, source);
            }
            // TODO: track stores through named locals; they are currently
            // invisible to later loads of the same local
            OperandClass::Local => {}
            _ => {}
        }
        Ok(())
    }

    fn check_call(&mut self, instr: &Instr) -> MirCheckResult<()> {
        check_form(instr, 1, 0)?;
        let callee_op = &instr.operands[0];
        let Some(callee) = self.resolve_procedure(callee_op) else {
            return Err(ProcedureNotFoundError {
                instr: instr.to_string(),
            }
            .into());
        };

        // arguments must be staged in the callee-interproc region; each slot
        // is consumed by the call
        for (index, formal) in callee.args.iter().enumerate() {
            let Some(actual) = self.callee_interproc.load(index) else {
                return Err(LoadingGarbageError {
                    instr: instr.to_string(),
                }
                .into());
            };
            if actual.ty != formal.ty {
                return Err(BadArgumentError {
                    arg: actual.to_string(),
                    formal: formal.ty.to_string(),
                    instr: instr.to_string(),
                }
                .into());
            }
            self.callee_interproc.clear(index);
        }

        // upon return the same region holds the formal returns
        for (index, ret) in callee.rets.iter().enumerate() {
            self.callee_interproc
                .store(index, Operand::callee_interproc(index, *ret));
        }
        Ok(())
    }

    fn resolve_procedure(&self, op: &Operand) -> Option<&'m Procedure> {
        match &op.symbol {
            Some(SymbolRef::Global(name)) if op.ty == Type::Proc => self.module.procedure(name),
            _ => None,
        }
    }

    /// Synthesize the value a named local holds, from the procedure's
    /// declaration tables.
    fn local_operand(&self, instr: &Instr, op: &Operand) -> MirCheckResult<Operand> {
        let param = match &op.symbol {
            Some(SymbolRef::Local(index)) => self.proc.locals.get(*index),
            Some(SymbolRef::Arg(index)) => self.proc.args.get(*index),
            _ => None,
        };
        let Some(param) = param else {
            return Err(MalformedInstructionError {
                instr: instr.to_string(),
            }
            .into());
        };
        Ok(Operand {
            class: OperandClass::Local,
            ty: param.ty,
            num: -1,
            symbol: op.symbol.clone(),
        })
    }
}

fn check_arith(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 2, 1)?;
    let a = &instr.operands[0];
    let b = &instr.operands[1];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, b.ty, dest.ty])?;
    check_binary(instr, &NUM_IMME, &NUM_IMME, &NUM_REG)
}

fn check_compare(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 2, 1)?;
    let a = &instr.operands[0];
    let b = &instr.operands[1];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, b.ty])?;
    if !dest.ty.is_bool() {
        return Err(unequal_types(instr));
    }
    check_binary(instr, &BASIC_IMME, &BASIC_IMME, &BOOL_REG)
}

fn check_logical(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 2, 1)?;
    let a = &instr.operands[0];
    let b = &instr.operands[1];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, b.ty, dest.ty])?;
    check_binary(instr, &BOOL_IMME, &BOOL_IMME, &BOOL_REG)
}

fn check_not(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 1, 1)?;
    let a = &instr.operands[0];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
    check_unary(instr, &BOOL_IMME, &BOOL_REG)
}

fn check_unary_arith(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 1, 1)?;
    let a = &instr.operands[0];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
    check_unary(instr, &NUM_IMME, &NUM_REG)
}

fn check_convert(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 1, 1)?;
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, dest.ty])?;
    check_unary(instr, &BASIC_IMME, &BASIC_REG)
}

/// The allocator passes offsets through untouched, so the MIR rule mirrors
/// the HIR one with concrete classes.
fn check_offset(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 2, 1)?;
    let b = &instr.operands[1];
    check_equal(instr, &[instr.ty, b.ty])?;
    check_binary(instr, &PTR_IMME, &NUM_IMME, &PTR_REG)
}

fn check_load_ptr(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 1, 1)?;
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, dest.ty])?;
    check_unary(instr, &PTR_IMME, &BASIC_OR_PROC_REG)
}

fn check_store_ptr(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 2, 0)?;
    let a = &instr.operands[0];
    let pointer = &instr.operands[1];
    check_equal(instr, &[instr.ty, a.ty])?;
    if BASIC_OR_PROC_REG.check(a) && PTR_IMME.check(pointer) {
        return Ok(());
    }
    Err(MalformedOperandError {
        instr: instr.to_string(),
    }
    .into())
}

fn check_copy(instr: &Instr) -> MirCheckResult<()> {
    check_form(instr, 1, 1)?;
    let a = &instr.operands[0];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
    check_unary(instr, &BASIC_OR_PROC_IMME, &BASIC_OR_PROC_REG)
}

fn check_invalid_class(instr: &Instr) -> MirCheckResult<()> {
    let invalid = instr
        .operands
        .iter()
        .chain(&instr.destinations)
        .any(|op| op.class == OperandClass::Invalid);
    if invalid {
        return Err(InvalidClassError {
            instr: instr.to_string(),
        }
        .into());
    }
    Ok(())
}

fn check_form(instr: &Instr, num_operands: usize, num_destinations: usize) -> MirCheckResult<()> {
    if instr.operands.len() != num_operands || instr.destinations.len() != num_destinations {
        return Err(MalformedInstructionError {
            instr: instr.to_string(),
        }
        .into());
    }
    Ok(())
}

fn check_equal(instr: &Instr, types: &[Type]) -> MirCheckResult<()> {
    let Some((first, rest)) = types.split_first() else {
        return Ok(());
    };
    if rest.iter().any(|ty| ty != first) {
        return Err(unequal_types(instr));
    }
    Ok(())
}

fn check_binary(
    instr: &Instr,
    rule_a: &OperandRule,
    rule_b: &OperandRule,
    rule_dest: &OperandRule,
) -> MirCheckResult<()> {
    if rule_a.check(&instr.operands[0])
        && rule_b.check(&instr.operands[1])
        && rule_dest.check(&instr.destinations[0])
    {
        return Ok(());
    }
    Err(MalformedOperandError {
        instr: instr.to_string(),
    }
    .into())
}

fn check_unary(instr: &Instr, rule_a: &OperandRule, rule_dest: &OperandRule) -> MirCheckResult<()> {
    if rule_a.check(&instr.operands[0]) && rule_dest.check(&instr.destinations[0]) {
        return Ok(());
    }
    Err(MalformedOperandError {
        instr: instr.to_string(),
    }
    .into())
}

/// Region slot index of an interproc or spill operand.
fn slot_index(instr: &Instr, op: &Operand) -> MirCheckResult<usize> {
    usize::try_from(op.num).map_err(|_| {
        MirCheckError::from(MalformedInstructionError {
            instr: instr.to_string(),
        })
    })
}

fn unequal_types(instr: &Instr) -> MirCheckError {
    UnequalTypesError {
        instr: instr.to_string(),
    }
    .into()
}
