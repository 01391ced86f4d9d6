use crate::operand::Operand;
use crate::ty::Type;
use std::fmt::{self, Display};

/// Instruction opcodes shared by both IR flavours.
///
/// `Offset` only occurs in HIR; `Copy`, `LoadSpill` and `StoreSpill` only in
/// MIR. The well-formedness passes enforce the split.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Diff,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
    Neg,
    Pos,
    Convert,
    /// Pointer displacement: pointer plus integer yields pointer.
    Offset,
    /// Load through a pointer operand.
    LoadPtr,
    /// Store through a pointer operand.
    StorePtr,
    /// Load from a named or numbered location.
    Load,
    /// Store to a named or numbered location.
    Store,
    Copy,
    Call,
    /// Reload of a spilled value into a register.
    LoadSpill,
    /// Save of a register into the spill area.
    StoreSpill,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Rem => "rem",
            Opcode::Eq => "eq",
            Opcode::Diff => "diff",
            Opcode::Lt => "lt",
            Opcode::Gt => "gt",
            Opcode::Le => "le",
            Opcode::Ge => "ge",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Not => "not",
            Opcode::Neg => "neg",
            Opcode::Pos => "pos",
            Opcode::Convert => "conv",
            Opcode::Offset => "offset",
            Opcode::LoadPtr => "load.ptr",
            Opcode::StorePtr => "store.ptr",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Copy => "copy",
            Opcode::Call => "call",
            Opcode::LoadSpill => "load.spill",
            Opcode::StoreSpill => "store.spill",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// A single instruction: an opcode, the type the operation is performed at,
/// and ordered operand and destination lists.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub op: Opcode,
    pub ty: Type,
    pub operands: Vec<Operand>,
    pub destinations: Vec<Operand>,
}

impl Instr {
    pub fn new(op: Opcode, ty: Type, operands: Vec<Operand>, destinations: Vec<Operand>) -> Self {
        Self {
            op,
            ty,
            operands,
            destinations,
        }
    }

    pub fn binary(op: Opcode, ty: Type, a: Operand, b: Operand, dest: Operand) -> Self {
        Self::new(op, ty, vec![a, b], vec![dest])
    }

    pub fn unary(op: Opcode, ty: Type, a: Operand, dest: Operand) -> Self {
        Self::new(op, ty, vec![a], vec![dest])
    }

    /// Load from a named or numbered location into `dest`.
    pub fn load(ty: Type, source: Operand, dest: Operand) -> Self {
        Self::new(Opcode::Load, ty, vec![source], vec![dest])
    }

    /// Store `value` to a named or numbered location.
    pub fn store(ty: Type, value: Operand, dest: Operand) -> Self {
        Self::new(Opcode::Store, ty, vec![value], vec![dest])
    }

    /// Store `value` through `pointer`. In HIR the pointer rides in the
    /// destination slot; the allocator reshapes this into the two-operand
    /// MIR form.
    pub fn store_ptr(ty: Type, value: Operand, pointer: Operand) -> Self {
        Self::new(Opcode::StorePtr, ty, vec![value], vec![pointer])
    }

    pub fn load_ptr(ty: Type, pointer: Operand, dest: Operand) -> Self {
        Self::new(Opcode::LoadPtr, ty, vec![pointer], vec![dest])
    }

    pub fn call(callee: Operand, args: Vec<Operand>, destinations: Vec<Operand>) -> Self {
        let ty = match destinations.as_slice() {
            [single] => single.ty,
            _ => Type::MultiRet,
        };
        let mut operands = vec![callee];
        operands.extend(args);
        Self::new(Opcode::Call, ty, operands, destinations)
    }

    pub fn load_spill(ty: Type, source: Operand, dest: Operand) -> Self {
        Self::new(Opcode::LoadSpill, ty, vec![source], vec![dest])
    }

    pub fn store_spill(ty: Type, source: Operand, dest: Operand) -> Self {
        Self::new(Opcode::StoreSpill, ty, vec![source], vec![dest])
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.op, self.ty)?;
        for (index, op) in self.operands.iter().enumerate() {
            if index == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ", {}", op)?;
            }
        }
        if !self.destinations.is_empty() {
            write!(f, " -> ")?;
            for (index, dest) in self.destinations.iter().enumerate() {
                if index == 0 {
                    write!(f, "{}", dest)?;
                } else {
                    write!(f, ", {}", dest)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Instr, Opcode};
    use crate::operand::Operand;
    use crate::ty::Type;

    #[test]
    fn test_instr_rendering() {
        let add = Instr::binary(
            Opcode::Add,
            Type::I64,
            Operand::temp(0, Type::I64),
            Operand::temp(1, Type::I64),
            Operand::temp(2, Type::I64),
        );
        assert_eq!(add.to_string(), "add:i64 %t0:i64, %t1:i64 -> %t2:i64");

        let call = Instr::call(
            Operand::proc_ref("f"),
            vec![Operand::lit(7, Type::I32)],
            vec![],
        );
        assert_eq!(call.to_string(), "call:multiret @f:proc, 7:i32");

        let reload = Instr::load_spill(
            Type::I64,
            Operand::spill(0, Type::I64),
            Operand::register(1, Type::I64),
        );
        assert_eq!(reload.to_string(), "load.spill:i64 %s0:i64 -> %r1:i64");
    }
}
