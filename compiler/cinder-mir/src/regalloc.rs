//! The register allocation pass.
//!
//! Allocation is blockwise: each basic block starts with the register file
//! and the spill area fully free, and is scanned left to right. Temporary
//! operands are rewritten in place; spill stores and reloads are queued with
//! the index of the instruction they must precede and spliced in after the
//! scan, so the scan never invalidates its own indices.
//!
//! When the register file is exhausted the victim is the register whose value
//! is read furthest in the future (Belady's MIN, optimal per block since the
//! whole block is known). A value with no remaining read ranks as furthest of
//! all; ties prefer the highest-numbered register, keeping the choice
//! deterministic.

use cinder_diagnostics::ice;
use cinder_ir::cfg::{BasicBlock, Procedure, Terminator};
use cinder_ir::instr::{Instr, Opcode};
use cinder_ir::operand::{Operand, OperandClass};
use cinder_ir::ty::Type;
use cinder_ir::{Module, Symbol};
use std::collections::BTreeMap;

/// Slots the spill free list starts with; more are minted on demand.
const INITIAL_SPILL_SLOTS: usize = 16;

/// Hard bound on the spill area. A block that needs more simultaneous spill
/// slots than this has escaped any plausible register pressure and indicates
/// a bug in upstream lowering.
pub const MAX_SPILL_SLOTS: usize = 1 << 16;

/// Rewrites every temporary in a module to a physical register or spill
/// slot. The register count is fixed at construction and must be at least
/// one.
pub struct RegisterAllocator {
    num_registers: usize,
}

impl RegisterAllocator {
    pub fn new(num_registers: usize) -> Self {
        if num_registers == 0 {
            ice!("register allocator constructed with an empty register file");
        }
        Self { num_registers }
    }

    pub fn allocate(&self, module: &mut Module) {
        for symbol in module.globals.values_mut() {
            if let Symbol::Procedure(proc) = symbol {
                self.allocate_procedure(proc);
            }
        }
    }

    fn allocate_procedure(&self, proc: &mut Procedure) {
        proc.spill_region_size = 0;
        for block in &mut proc.blocks {
            let mut state = BlockState::new(self.num_registers);
            state.visit_block(block);
            proc.spill_region_size = proc.spill_region_size.max(state.spill_high_water);
        }
    }
}

/// A block-local virtual value: the id of a temporary operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Value(i64);

#[derive(Debug, Clone, Copy)]
enum Location {
    Register(usize),
    Spill(usize),
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    loc: Location,
    ty: Type,
}

/// The instructions ahead of the one being rewritten, used to answer
/// next-use queries. `cond_temp` is the block terminator's condition when it
/// reads a temporary; it counts as a use past the last instruction.
#[derive(Clone, Copy)]
struct Scan<'a> {
    rest: &'a [Instr],
    cond_temp: Option<Value>,
}

impl Scan<'_> {
    /// Offset of the next read of `v`, or `None` when the value is dead.
    /// `rest.len()` marks a use by the terminator.
    fn next_use(&self, v: Value) -> Option<usize> {
        for (offset, instr) in self.rest.iter().enumerate() {
            if instr_reads(instr, v) {
                return Some(offset);
            }
        }
        if self.cond_temp == Some(v) {
            return Some(self.rest.len());
        }
        None
    }
}

fn instr_reads(instr: &Instr, v: Value) -> bool {
    let reads_temp = |op: &Operand| op.class == OperandClass::Temp && op.num == v.0;
    match instr.op {
        // call arguments travel through the callee-interproc region and are
        // dropped during allocation; the operand list is not a read
        Opcode::Call => false,
        // the pointer of a store rides in the destination slot in HIR
        Opcode::StorePtr => instr
            .operands
            .iter()
            .chain(&instr.destinations)
            .any(reads_temp),
        _ => instr.operands.iter().any(reads_temp),
    }
}

struct BlockState {
    free_regs: Vec<usize>,
    used_regs: BTreeMap<usize, Value>,
    free_slots: Vec<usize>,
    next_slot: usize,
    live: BTreeMap<Value, Placement>,
    deferred: Vec<(usize, Instr)>,
    spill_high_water: usize,
}

impl BlockState {
    fn new(num_registers: usize) -> Self {
        Self {
            // popping yields register 0 first
            free_regs: (0..num_registers).rev().collect(),
            used_regs: BTreeMap::new(),
            free_slots: (0..INITIAL_SPILL_SLOTS).rev().collect(),
            next_slot: INITIAL_SPILL_SLOTS,
            live: BTreeMap::new(),
            deferred: Vec::new(),
            spill_high_water: 0,
        }
    }

    fn visit_block(&mut self, block: &mut BasicBlock) {
        let BasicBlock {
            code, terminator, ..
        } = block;
        let cond_temp = match terminator {
            Terminator::Branch { cond, .. } if cond.class == OperandClass::Temp => {
                Some(Value(cond.num))
            }
            _ => None,
        };
        for index in 0..code.len() {
            let (head, tail) = code.split_at_mut(index + 1);
            let scan = Scan {
                rest: tail,
                cond_temp,
            };
            self.visit_instr(&mut head[index], scan, index);
        }
        let end = code.len();
        match terminator {
            Terminator::Branch { cond, .. } if cond.class == OperandClass::Temp => {
                let scan = Scan {
                    rest: &[],
                    cond_temp: None,
                };
                let placed = self.ensure(&cond.clone(), scan, end, &mut Vec::new());
                *cond = placed;
            }
            // return values live in the caller-interproc region in MIR
            Terminator::Return(values) => values.clear(),
            _ => {}
        }
        self.splice(code);
    }

    fn visit_instr(&mut self, instr: &mut Instr, scan: Scan<'_>, index: usize) {
        match instr.op {
            Opcode::Call => {
                // arguments and returns travel through the interproc
                // regions; a MIR call keeps only its callee reference
                instr.operands.truncate(1);
                instr.destinations.clear();
            }
            Opcode::StorePtr => {
                let mut pinned = Vec::new();
                let mut reads = Vec::new();
                for op in instr.operands.iter_mut().chain(instr.destinations.iter_mut()) {
                    if op.class == OperandClass::Temp {
                        let v = Value(op.num);
                        *op = self.ensure(op, scan, index, &mut pinned);
                        if !reads.contains(&v) {
                            reads.push(v);
                        }
                    }
                }
                for v in reads {
                    self.release_if_unused(v, scan);
                }
                // reshape to the MIR form: (value, pointer) -> ()
                if let Some(pointer) = instr.destinations.pop() {
                    instr.operands.push(pointer);
                }
            }
            _ => {
                let mut pinned = Vec::new();
                let mut reads = Vec::new();
                for op in instr.operands.iter_mut() {
                    if op.class == OperandClass::Temp {
                        let v = Value(op.num);
                        *op = self.ensure(op, scan, index, &mut pinned);
                        if !reads.contains(&v) {
                            reads.push(v);
                        }
                    }
                }
                for v in reads {
                    self.release_if_unused(v, scan);
                }
                for op in instr.destinations.iter_mut() {
                    if op.class == OperandClass::Temp {
                        *op = self.define(op, scan, index, &mut Vec::new());
                    }
                }
            }
        }
    }

    /// Place a read of `op`'s temporary and return the register operand that
    /// replaces it. A temporary that is not live is treated as a fresh
    /// definition; the MIR checker's region simulation is what flags the
    /// underlying read-before-write.
    fn ensure(
        &mut self,
        op: &Operand,
        scan: Scan<'_>,
        index: usize,
        pinned: &mut Vec<usize>,
    ) -> Operand {
        let v = Value(op.num);
        match self.live.get(&v).map(|placement| placement.loc) {
            None => self.define(op, scan, index, pinned),
            Some(Location::Register(r)) => {
                pinned.push(r);
                Operand::register(r, op.ty)
            }
            Some(Location::Spill(slot)) => self.reload(op, slot, scan, index, pinned),
        }
    }

    /// Bind `op`'s temporary to a register, evicting if the file is full.
    fn define(
        &mut self,
        op: &Operand,
        scan: Scan<'_>,
        index: usize,
        pinned: &mut Vec<usize>,
    ) -> Operand {
        let v = Value(op.num);
        // a redefinition abandons the value's old register; a spilled
        // value's slot is handed back by the reload path once the reload is
        // queued
        if let Some(old) = self.live.remove(&v) {
            if let Location::Register(r) = old.loc {
                self.used_regs.remove(&r);
                self.free_regs.push(r);
            }
        }
        let r = match self.free_regs.pop() {
            Some(r) => r,
            None => self.evict_furthest(scan, index, pinned),
        };
        self.used_regs.insert(r, v);
        self.live.insert(
            v,
            Placement {
                loc: Location::Register(r),
                ty: op.ty,
            },
        );
        pinned.push(r);
        Operand::register(r, op.ty)
    }

    /// Bring a spilled value back into a register, queueing the reload in
    /// front of the instruction that reads it. The slot returns to the free
    /// list only after the reload is queued: any later store that reuses it
    /// is spliced after the reload and cannot clobber the value early.
    fn reload(
        &mut self,
        op: &Operand,
        slot: usize,
        scan: Scan<'_>,
        index: usize,
        pinned: &mut Vec<usize>,
    ) -> Operand {
        let reg_op = self.define(op, scan, index, pinned);
        let spill_op = Operand::spill(slot, op.ty);
        self.queue(index, Instr::load_spill(op.ty, spill_op, reg_op.clone()));
        self.free_slots.push(slot);
        reg_op
    }

    /// Pick and spill the eviction victim, returning the freed register.
    /// Registers in `pinned` are claimed by the current instruction's reads
    /// and exempt.
    fn evict_furthest(&mut self, scan: Scan<'_>, index: usize, pinned: &[usize]) -> usize {
        let mut best: Option<(usize, Value, Option<usize>)> = None;
        for (&r, &v) in &self.used_regs {
            if pinned.contains(&r) {
                continue;
            }
            let next = scan.next_use(v);
            let better = match &best {
                None => true,
                Some((_, _, best_next)) => match (next, *best_next) {
                    // a value never read again is the furthest possible
                    (None, _) => true,
                    (Some(_), None) => false,
                    // ties prefer the higher register
                    (Some(a), Some(b)) => a >= b,
                },
            };
            if better {
                best = Some((r, v, next));
            }
        }
        let Some((r, v, _)) = best else {
            ice!("register pressure exceeds the register file: every register is pinned")
        };

        let ty = self
            .live
            .get(&v)
            .map(|placement| placement.ty)
            .unwrap_or_else(|| ice!("spilling a register that holds no live value"));
        let slot = self.alloc_slot();
        self.used_regs.remove(&r);
        self.live.insert(
            v,
            Placement {
                loc: Location::Spill(slot),
                ty,
            },
        );
        self.queue(
            index,
            Instr::store_spill(ty, Operand::register(r, ty), Operand::spill(slot, ty)),
        );
        r
    }

    fn alloc_slot(&mut self) -> usize {
        let slot = self.free_slots.pop().unwrap_or_else(|| {
            let fresh = self.next_slot;
            self.next_slot += 1;
            fresh
        });
        if slot >= MAX_SPILL_SLOTS {
            ice!(format!("spill region exceeded {} slots", MAX_SPILL_SLOTS));
        }
        self.spill_high_water = self.spill_high_water.max(slot + 1);
        slot
    }

    /// Release `v`'s location once the block no longer reads it.
    fn release_if_unused(&mut self, v: Value, scan: Scan<'_>) {
        if scan.next_use(v).is_some() {
            return;
        }
        let placement = self
            .live
            .remove(&v)
            .unwrap_or_else(|| ice!("releasing a value that is not live"));
        match placement.loc {
            Location::Register(r) => {
                self.used_regs.remove(&r);
                self.free_regs.push(r);
            }
            Location::Spill(slot) => {
                self.free_slots.push(slot);
            }
        }
    }

    /// Queue `instr` to execute immediately before the instruction currently
    /// at `before`.
    fn queue(&mut self, before: usize, instr: Instr) {
        self.deferred.push((before, instr));
    }

    /// Splice the deferred spill traffic into the block. The queue is in
    /// scan order, so the k-th record lands at its original index plus k.
    fn splice(&mut self, code: &mut Vec<Instr>) {
        for (shift, (before, instr)) in self.deferred.drain(..).enumerate() {
            code.insert(before + shift, instr);
        }
    }
}
