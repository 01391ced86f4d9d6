use cinder_macros::declare_error_type;
use miette::Diagnostic;
use thiserror::Error;

declare_error_type! {
    #[error("mir well-formedness error: {0}")]
    pub enum MirCheckError {
        MalformedInstruction(MalformedInstructionError),
        UnequalTypes(UnequalTypesError),
        MalformedOperand(MalformedOperandError),
        InvalidClass(InvalidClassError),
        LoadingGarbage(LoadingGarbageError),
        ProcedureNotFound(ProcedureNotFoundError),
        BadArgument(BadArgumentError),
        EmptyReturnSlot(EmptyReturnSlotError),
        BadReturn(BadReturnError),
    }
}

/// Handy type alias for all MIR checker errors.
pub type MirCheckResult<T> = Result<T, MirCheckError>;

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::malformed_instruction))]
#[error("malformed instruction: {instr}")]
pub struct MalformedInstructionError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::unequal_types))]
#[error("unequal types: {instr}")]
pub struct UnequalTypesError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::malformed_type_or_class))]
#[error("malformed type or class: {instr}")]
pub struct MalformedOperandError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::invalid_class))]
#[error("invalid class: {instr}")]
pub struct InvalidClassError {
    pub instr: String,
}

/// A region slot was read before anything was stored into it.
#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::loading_garbage))]
#[error("loading garbage: {instr}")]
pub struct LoadingGarbageError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::procedure_not_found))]
#[error("procedure not found: {instr}")]
pub struct ProcedureNotFoundError {
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::bad_argument))]
#[error("argument {arg} doesn't match formal parameter ({formal}): {instr}")]
pub struct BadArgumentError {
    pub arg: String,
    pub formal: String,
    pub instr: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::empty_return_slot))]
#[error("return slot {index} is empty in procedure {proc}")]
pub struct EmptyReturnSlotError {
    pub index: usize,
    pub proc: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(mir_check::bad_return))]
#[error("return of type {formal} doesn't match value in slot: {slot}")]
pub struct BadReturnError {
    pub formal: String,
    pub slot: String,
}
