use crate::ty::Type;
use std::fmt::{self, Display};

/// Where an operand's value lives.
///
/// The HIR and MIR class sets are unioned into a single discriminator. HIR
/// only distinguishes readable sources ([`OperandClass::is_operable`]) from
/// legal destinations ([`OperandClass::is_result`]); MIR names the concrete
/// storage and is queried through [`OperandClass::is_immediate`],
/// [`OperandClass::is_register`] and [`OperandClass::is_addressable`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandClass {
    /// A virtual temporary, local to a single basic block. HIR only; the
    /// register allocator replaces every temporary with a register or a
    /// spill slot.
    Temp,
    /// An immediate literal value.
    Lit,
    /// A named, addressable procedure local.
    Local,
    /// A named module global (data or a procedure reference).
    Global,
    /// A physical register. MIR only.
    Register,
    /// A numbered slot in the spill area. MIR only.
    Spill,
    /// A numbered slot of the caller-interproc region, holding incoming
    /// arguments and staged outgoing returns.
    CallerInterproc,
    /// A numbered slot of the callee-interproc region, marshalling outgoing
    /// call arguments and received returns.
    CalleeInterproc,
    /// Sentinel; must never appear in a well-formed program.
    Invalid,
}

impl OperandClass {
    /// HIR: any readable value source.
    pub fn is_operable(self) -> bool {
        matches!(
            self,
            OperandClass::Temp
                | OperandClass::Lit
                | OperandClass::Local
                | OperandClass::Global
                | OperandClass::CallerInterproc
                | OperandClass::CalleeInterproc
        )
    }

    /// HIR: a legal instruction destination.
    pub fn is_result(self) -> bool {
        matches!(
            self,
            OperandClass::Temp
                | OperandClass::Local
                | OperandClass::CallerInterproc
                | OperandClass::CalleeInterproc
        )
    }

    /// MIR: an immediate-or-equivalent source that needs no memory access.
    pub fn is_immediate(self) -> bool {
        matches!(
            self,
            OperandClass::Register | OperandClass::Lit | OperandClass::Global
        )
    }

    /// MIR: a physical register.
    pub fn is_register(self) -> bool {
        matches!(self, OperandClass::Register)
    }

    /// MIR: named or numbered memory reachable through a load or store.
    pub fn is_addressable(self) -> bool {
        matches!(
            self,
            OperandClass::Spill
                | OperandClass::Local
                | OperandClass::CallerInterproc
                | OperandClass::CalleeInterproc
        )
    }
}

/// Reference from an operand back to the named entity it denotes.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRef {
    /// A module global, by name.
    Global(String),
    /// The enclosing procedure's n-th formal argument.
    Arg(usize),
    /// The enclosing procedure's n-th local.
    Local(usize),
}

/// A single instruction operand.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub class: OperandClass,
    pub ty: Type,
    /// Index whose meaning depends on `class`: temporary id, literal value,
    /// register number, spill slot or interproc slot.
    pub num: i64,
    pub symbol: Option<SymbolRef>,
}

impl Operand {
    pub fn temp(num: i64, ty: Type) -> Self {
        Self {
            class: OperandClass::Temp,
            ty,
            num,
            symbol: None,
        }
    }

    pub fn lit(value: i64, ty: Type) -> Self {
        Self {
            class: OperandClass::Lit,
            ty,
            num: value,
            symbol: None,
        }
    }

    pub fn register(num: usize, ty: Type) -> Self {
        Self {
            class: OperandClass::Register,
            ty,
            num: num as i64,
            symbol: None,
        }
    }

    pub fn spill(slot: usize, ty: Type) -> Self {
        Self {
            class: OperandClass::Spill,
            ty,
            num: slot as i64,
            symbol: None,
        }
    }

    pub fn caller_interproc(slot: usize, ty: Type) -> Self {
        Self {
            class: OperandClass::CallerInterproc,
            ty,
            num: slot as i64,
            symbol: None,
        }
    }

    pub fn callee_interproc(slot: usize, ty: Type) -> Self {
        Self {
            class: OperandClass::CalleeInterproc,
            ty,
            num: slot as i64,
            symbol: None,
        }
    }

    /// An operand naming the enclosing procedure's n-th local.
    pub fn local(index: usize, ty: Type) -> Self {
        Self {
            class: OperandClass::Local,
            ty,
            num: -1,
            symbol: Some(SymbolRef::Local(index)),
        }
    }

    /// An operand naming the enclosing procedure's n-th formal argument.
    pub fn arg(index: usize, ty: Type) -> Self {
        Self {
            class: OperandClass::Local,
            ty,
            num: -1,
            symbol: Some(SymbolRef::Arg(index)),
        }
    }

    pub fn global(name: impl Into<String>, ty: Type) -> Self {
        Self {
            class: OperandClass::Global,
            ty,
            num: -1,
            symbol: Some(SymbolRef::Global(name.into())),
        }
    }

    /// A reference to a procedure global, as used by call instructions.
    pub fn proc_ref(name: impl Into<String>) -> Self {
        Self::global(name, Type::Proc)
    }

    pub fn with_symbol(mut self, symbol: SymbolRef) -> Self {
        self.symbol = Some(symbol);
        self
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            OperandClass::Temp => write!(f, "%t{}", self.num)?,
            OperandClass::Lit => write!(f, "{}", self.num)?,
            OperandClass::Register => write!(f, "%r{}", self.num)?,
            OperandClass::Spill => write!(f, "%s{}", self.num)?,
            OperandClass::CallerInterproc => write!(f, "%caller{}", self.num)?,
            OperandClass::CalleeInterproc => write!(f, "%callee{}", self.num)?,
            OperandClass::Local => match &self.symbol {
                Some(SymbolRef::Local(index)) => write!(f, "$l{}", index)?,
                Some(SymbolRef::Arg(index)) => write!(f, "$a{}", index)?,
                _ => write!(f, "$?")?,
            },
            OperandClass::Global => match &self.symbol {
                Some(SymbolRef::Global(name)) => write!(f, "@{}", name)?,
                _ => write!(f, "@?")?,
            },
            OperandClass::Invalid => write!(f, "<invalid>")?,
        }
        write!(f, ":{}", self.ty)
    }
}
