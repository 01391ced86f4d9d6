use cinder_macros::declare_error_type;
use miette::Diagnostic;
use thiserror::Error;

declare_error_type! {
    #[error("hir well-formedness error: {0}")]
    pub enum HirCheckError {
        MalformedInstruction(MalformedInstructionError),
        UnequalTypes(UnequalTypesError),
        MalformedOperand(MalformedOperandError),
        ProcedureNotFound(ProcedureNotFoundError),
        ArgumentCountMismatch(ArgumentCountMismatchError),
        ReturnCountMismatch(ReturnCountMismatchError),
        BadArgument(BadArgumentError),
        BadReturn(BadReturnError),
    }
}

/// Handy type alias for all HIR checker errors.
pub type HirCheckResult<T> = Result<T, HirCheckError>;

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::malformed_instruction))]
#[error("malformed instruction: {instr}")]
pub struct MalformedInstructionError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::unequal_types))]
#[error("unequal types: {instr}")]
pub struct UnequalTypesError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::malformed_type_or_class))]
#[error("malformed type or class: {instr}")]
pub struct MalformedOperandError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::procedure_not_found))]
#[error("procedure not found: {instr}")]
pub struct ProcedureNotFoundError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::argument_count_mismatch))]
#[error("expected {expected} arguments, instead found {actual}: {instr}")]
pub struct ArgumentCountMismatchError {
    pub expected: usize,
    pub actual: usize,
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::return_count_mismatch))]
#[error("expected {expected} returns, instead found {actual}: {context}")]
pub struct ReturnCountMismatchError {
    pub expected: usize,
    pub actual: usize,
    /// The offending call instruction, or the procedure whose return
    /// terminator is at fault.
    pub context: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::bad_argument))]
#[error("argument {arg} doesn't match formal parameter {formal}: {instr}")]
pub struct BadArgumentError {
    pub arg: String,
    pub formal: String,
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(hir_check::bad_return))]
#[error("return {ret} doesn't match formal return {formal}: {context}")]
pub struct BadReturnError {
    pub ret: String,
    pub formal: String,
    pub context: String,
}
