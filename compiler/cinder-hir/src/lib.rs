//! Well-formedness checking for HIR modules.
//!
//! The HIR checker is the contract between upstream lowering and the register
//! allocator: a module that passes it is structurally sound, classifies every
//! operand as a legal source or destination, and respects the per-opcode type
//! equality laws. Errors out of this crate indicate a compiler bug in the
//! producing pass, not a user error.

pub mod check;
pub mod error;
