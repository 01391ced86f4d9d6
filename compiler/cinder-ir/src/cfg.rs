use crate::instr::Instr;
use crate::operand::Operand;
use crate::ty::Type;
use std::cell::Cell;
use std::fmt::{self, Display};

/// Stable identity of a basic block: its index in the owning procedure's
/// block arena. Terminators refer to successors by id, which keeps cyclic
/// control flow free of ownership cycles.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

impl Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Outgoing control flow of a basic block.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        cond: Operand,
        true_target: BlockId,
        false_target: BlockId,
    },
    /// In HIR the list carries the returned values, matching the procedure's
    /// formal returns. In MIR the list is empty: return values live in the
    /// caller-interproc region.
    Return(Vec<Operand>),
}

impl Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump(target) => write!(f, "jmp {}", target),
            Terminator::Branch {
                cond,
                true_target,
                false_target,
            } => write!(f, "if {} -> {}, {}", cond, true_target, false_target),
            Terminator::Return(values) => {
                write!(f, "ret")?;
                for (index, value) in values.iter().enumerate() {
                    if index == 0 {
                        write!(f, " {}", value)?;
                    } else {
                        write!(f, ", {}", value)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// A basic block: a label, straight-line code and a terminator.
///
/// The `visited` flag is interior-mutable so the read-only passes can memoize
/// their traversal; each pass resets it before descending into a procedure.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub code: Vec<Instr>,
    pub terminator: Terminator,
    pub visited: Cell<bool>,
}

impl BasicBlock {
    /// A fresh block terminated by an empty return until a real terminator
    /// is attached.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: Vec::new(),
            terminator: Terminator::Return(Vec::new()),
            visited: Cell::new(false),
        }
    }
}

/// A named formal argument or local of a procedure.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcParam {
    pub name: String,
    pub ty: Type,
}

/// A procedure: a signature and a control-flow graph of basic blocks rooted
/// at `start`.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub args: Vec<ProcParam>,
    pub rets: Vec<Type>,
    pub locals: Vec<ProcParam>,
    pub start: BlockId,
    pub blocks: Vec<BasicBlock>,
    /// Number of spill slots the procedure needs, filled in by the register
    /// allocator as the maximum any of its blocks required.
    pub spill_region_size: usize,
}

impl Procedure {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0]
    }

    /// Clear every block's traversal flag. Called by each pass before it
    /// descends, which keeps the passes idempotent.
    pub fn reset_visited(&self) {
        for block in &self.blocks {
            block.visited.set(false);
        }
    }
}
