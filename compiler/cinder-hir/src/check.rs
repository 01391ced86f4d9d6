//! The HIR well-formedness pass.
//!
//! Every opcode is specified by a pair or triple of [`OperandRule`]s, each a
//! class predicate and a type predicate that must both hold on the operand in
//! that position, plus an equality law between the instruction type and the
//! participating operand types. Traversal follows the control-flow graph from
//! the entry block, memoized through the per-block visited flag; the first
//! error aborts the containing procedure's check.

use crate::error::{
    ArgumentCountMismatchError, BadArgumentError, BadReturnError, HirCheckError, HirCheckResult,
    MalformedInstructionError, MalformedOperandError, ProcedureNotFoundError,
    ReturnCountMismatchError, UnequalTypesError,
};
use cinder_diagnostics::ice;
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

const ANY_OPER: OperandRule = OperandRule {
    class: OperandClass::is_operable,
    ty: Type::is_any,
};
const ANY_RES: OperandRule = OperandRule {
    class: OperandClass::is_result,
    ty: Type::is_any,
};
const NUM_OPER: OperandRule = OperandRule {
    class: OperandClass::is_operable,
    ty: Type::is_number,
};
const NUM_RES: OperandRule = OperandRule {
    class: OperandClass::is_result,
    ty: Type::is_number,
};
const BOOL_OPER: OperandRule = OperandRule {
    class: OperandClass::is_operable,
    ty: Type::is_bool,
};
const BOOL_RES: OperandRule = OperandRule {
    class: OperandClass::is_result,
    ty: Type::is_bool,
};
const NON_PTR_OPER: OperandRule = OperandRule {
    class: OperandClass::is_operable,
    ty: Type::is_non_ptr,
};
const NON_PTR_RES: OperandRule = OperandRule {
    class: OperandClass::is_result,
    ty: Type::is_non_ptr,
};
const PTR_OPER: OperandRule = OperandRule {
    class: OperandClass::is_operable,
    ty: Type::is_ptr,
};
const PTR_RES: OperandRule = OperandRule {
    class: OperandClass::is_result,
    ty: Type::is_ptr,
};

/// Validates the structural, typing and classification invariants of a HIR
/// module before register allocation.
pub struct HirWellFormednessPass;

impl HirWellFormednessPass {
    pub fn visit(module: &Module) -> HirCheckResult<()> {
        for symbol in module.globals.values() {
            if let Symbol::Procedure(proc) = symbol {
                proc.reset_visited();
                let cx = CheckContext { module, proc };
                cx.visit_block(proc.start)?;
            }
        }
        Ok(())
    }
}

struct CheckContext<'m> {
    module: &'m Module,
    proc: &'m Procedure,
}

impl<'m> CheckContext<'m> {
    fn visit_block(&self, id: BlockId) -> HirCheckResult<()> {
        let block = self.proc.block(id);
        if block.visited.get() {
            return Ok(());
        }
        for instr in &block.code {
            self.visit_instr(instr)?;
        }
        block.visited.set(true);
        self.visit_terminator(&block.terminator)
    }

    fn visit_terminator(&self, terminator: &Terminator) -> HirCheckResult<()> {
        match terminator {
            Terminator::Jump(target) => self.visit_block(*target),
            Terminator::Branch {
                true_target,
                false_target,
                ..
            } => {
                self.visit_block(*true_target)?;
                self.visit_block(*false_target)
            }
            Terminator::Return(values) => self.visit_return(values),
        }
    }

    fn visit_return(&self, values: &[Operand]) -> HirCheckResult<()> {
        if values.len() != self.proc.rets.len() {
            return Err(ReturnCountMismatchError {
                expected: self.proc.rets.len(),
                actual: values.len(),
                context: self.proc.name.clone(),
            }
            .into());
        }
        for (formal, value) in self.proc.rets.iter().zip(values) {
            if value.ty != *formal {
                return Err(BadReturnError {
                    ret: value.to_string(),
                    formal: formal.to_string(),
                    context: self.proc.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn visit_instr(&self, instr: &Instr) -> HirCheckResult<()> {
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
            Opcode::Load | Opcode::Store => check_named_access(instr),
            Opcode::Call => self.check_call(instr),
            Opcode::Copy | Opcode::LoadSpill | Opcode::StoreSpill => {
                ice!(format!("mir-only opcode in hir: {}", instr))
            }
        }
    }

    fn check_call(&self, instr: &Instr) -> HirCheckResult<()> {
        let Some(callee_op) = instr.operands.first() else {
            return Err(malformed(instr));
        };
        let Some(callee) = self.resolve_procedure(callee_op) else {
            return Err(ProcedureNotFoundError {
                instr: instr.to_string(),
            }
            .into());
        };

        let actuals = &instr.operands[1..];
        if actuals.len() != callee.args.len() {
            return Err(ArgumentCountMismatchError {
                expected: callee.args.len(),
                actual: actuals.len(),
                instr: instr.to_string(),
            }
            .into());
        }
        if instr.destinations.len() != callee.rets.len() {
            return Err(ReturnCountMismatchError {
                expected: callee.rets.len(),
                actual: instr.destinations.len(),
                context: instr.to_string(),
            }
            .into());
        }

        for (formal, actual) in callee.args.iter().zip(actuals) {
            if actual.ty != formal.ty {
                return Err(BadArgumentError {
                    arg: actual.to_string(),
                    formal: formal.name.clone(),
                    instr: instr.to_string(),
                }
                .into());
            }
        }
        for (formal, dest) in callee.rets.iter().zip(&instr.destinations) {
            if dest.ty != *formal {
                return Err(BadReturnError {
                    ret: dest.to_string(),
                    formal: formal.to_string(),
                    context: instr.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn resolve_procedure(&self, op: &Operand) -> Option<&'m Procedure> {
        match &op.symbol {
            Some(SymbolRef::Global(name)) if op.ty == Type::Proc => self.module.procedure(name),
            _ => None,
        }
    }
}

fn check_arith(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 2, true)?;
    let a = &instr.operands[0];
    let b = &instr.operands[1];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, b.ty, dest.ty])?;
    check_binary(instr, &NUM_OPER, &NUM_OPER, &NUM_RES)
}

fn check_compare(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 2, true)?;
    let a = &instr.operands[0];
    let b = &instr.operands[1];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, b.ty])?;
    // comparisons produce a boolean regardless of the compared type; a
    // non-bool destination violates the typing law, not the class table
    if !dest.ty.is_bool() {
        return Err(unequal_types(instr));
    }
    check_binary(instr, &ANY_OPER, &ANY_OPER, &BOOL_RES)
}

fn check_logical(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 2, true)?;
    let a = &instr.operands[0];
    let b = &instr.operands[1];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, b.ty, dest.ty])?;
    check_binary(instr, &BOOL_OPER, &BOOL_OPER, &BOOL_RES)
}

fn check_unary_arith(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 1, true)?;
    let a = &instr.operands[0];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
    check_unary(instr, &NUM_OPER, &NUM_RES)
}

fn check_not(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 1, true)?;
    let a = &instr.operands[0];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
    check_unary(instr, &BOOL_OPER, &BOOL_RES)
}

fn check_convert(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 1, true)?;
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, dest.ty])?;
    check_unary(instr, &NON_PTR_OPER, &NON_PTR_RES)
}

fn check_offset(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 2, true)?;
    let b = &instr.operands[1];
    check_equal(instr, &[instr.ty, b.ty])?;
    check_binary(instr, &PTR_OPER, &NUM_OPER, &PTR_RES)
}

fn check_load_ptr(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 1, true)?;
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, dest.ty])?;
    check_unary(instr, &PTR_OPER, &ANY_RES)
}

fn check_store_ptr(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 1, true)?;
    let a = &instr.operands[0];
    check_equal(instr, &[instr.ty, a.ty])?;
    // the destination slot holds the pointer, which is read, not written
    check_unary(instr, &ANY_OPER, &PTR_OPER)
}

fn check_named_access(instr: &Instr) -> HirCheckResult<()> {
    check_form(instr, 1, true)?;
    let a = &instr.operands[0];
    let dest = &instr.destinations[0];
    check_equal(instr, &[instr.ty, a.ty, dest.ty])?;
    check_unary(instr, &ANY_OPER, &ANY_RES)
}

fn check_form(instr: &Instr, num_operands: usize, has_dest: bool) -> HirCheckResult<()> {
    if instr.operands.len() != num_operands {
        return Err(malformed(instr));
    }
    if has_dest && instr.destinations.len() != 1 {
        return Err(malformed(instr));
    }
    Ok(())
}

fn check_equal(instr: &Instr, types: &[Type]) -> HirCheckResult<()> {
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
) -> HirCheckResult<()> {
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

fn check_unary(instr: &Instr, rule_a: &OperandRule, rule_dest: &OperandRule) -> HirCheckResult<()> {
    if rule_a.check(&instr.operands[0]) && rule_dest.check(&instr.destinations[0]) {
        return Ok(());
    }
    Err(MalformedOperandError {
        instr: instr.to_string(),
    }
    .into())
}

fn malformed(instr: &Instr) -> HirCheckError {
    MalformedInstructionError {
        instr: instr.to_string(),
    }
    .into()
}

fn unequal_types(instr: &Instr) -> HirCheckError {
    UnequalTypesError {
        instr: instr.to_string(),
    }
    .into()
}
