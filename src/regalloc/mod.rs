// This module implements the per-block greedy register allocator. State is reset at
// the start of every basic block — a fresh register ownership table per block, never a
// cleared shared structure — and no allocation information crosses block boundaries
// (a documented scope limitation of the design, values travel between blocks through
// memory). The walk assigns each value-producing instruction one of three general
// purpose registers {ebx, ecx, edx} or marks it spilled. Arithmetic instructions only
// ever receive a register by in-place accumulation: the result takes over the first
// operand's register when that operand dies at the instruction; otherwise the
// instruction stays registerless and emission computes it through the scratch register
// into its frame slot. All other value producers take the lowest free register, or
// trigger spill selection: the register-resident value with the latest range end is
// compared against the current instruction, and whichever keeps the shorter remaining
// lifetime stays register-resident. The scratch register eax is never allocated here.

//! Liveness and register allocation.
//!
//! Produces an [`Allocation`] mapping every value to a register or the
//! spill marker, rebuilt independently for every block. Choices among
//! equivalent registers are canonical (lowest-numbered first) so that
//! identical input always produces identical output.

use log::debug;

use crate::ir::{Function, InstId, Opcode};

pub mod liveness;

pub use liveness::{BlockLiveness, LiveRange};

/// The three allocatable general-purpose registers. `eax` is the scratch
/// register and never appears in an [`Allocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    Ebx = 0,
    Ecx = 1,
    Edx = 2,
}

impl Reg {
    pub const ALL: [Reg; 3] = [Reg::Ebx, Reg::Ecx, Reg::Edx];

    pub fn name(self) -> &'static str {
        match self {
            Reg::Ebx => "ebx",
            Reg::Ecx => "ecx",
            Reg::Edx => "edx",
        }
    }
}

/// Location of a value: register-resident or spilled to its frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    Reg(Reg),
    Spill,
}

/// Value locations for a whole function, indexed by instruction arena id.
/// Absence means the instruction was never given a register (it produces
/// no value, or its in-place reuse condition failed); emission treats such
/// values like spills, through the scratch register and a frame slot.
#[derive(Debug)]
pub struct Allocation {
    locs: Vec<Option<Loc>>,
}

impl Allocation {
    pub fn get(&self, i: InstId) -> Option<Loc> {
        self.locs[i.index()]
    }

    /// Register of `i`, if it holds one.
    pub fn reg(&self, i: InstId) -> Option<Reg> {
        match self.get(i) {
            Some(Loc::Reg(r)) => Some(r),
            _ => None,
        }
    }

    fn set(&mut self, i: InstId, loc: Loc) {
        self.locs[i.index()] = Some(loc);
    }
}

/// Allocate registers for every block of the function.
pub fn allocate_registers(func: &Function) -> Allocation {
    let mut alloc = Allocation {
        locs: vec![None; func.arena_len()],
    };

    for b in func.block_ids() {
        let live = BlockLiveness::compute(func, b);
        // fresh ownership table per block
        let mut owner: [Option<InstId>; 3] = [None; 3];

        for &i in func.block(b).insts() {
            let opcode = func.opcode(i);
            if opcode == Opcode::Alloca {
                continue;
            }
            let at = live.index_of(i).expect("numbered instruction");

            match opcode {
                Opcode::Add | Opcode::Sub | Opcode::Mul => {
                    // in-place accumulation: take over the first operand's
                    // register iff that operand dies here
                    if let Some(first) = func.inst(i).operand(0).as_inst() {
                        if let Some(r) = alloc.reg(first) {
                            if live.dead_at(first, at) && owner[r as usize] == Some(first) {
                                owner[r as usize] = Some(i);
                                alloc.set(i, Loc::Reg(r));
                            }
                        }
                    }
                    // otherwise the instruction stays registerless; emission
                    // computes it in the scratch register
                }
                _ if opcode.produces_value() => {
                    if let Some(free) = (0..Reg::ALL.len()).find(|&r| owner[r].is_none()) {
                        owner[free] = Some(i);
                        alloc.set(i, Loc::Reg(Reg::ALL[free]));
                    } else {
                        spill_one(func, &live, &mut owner, &mut alloc, i, at);
                    }
                }
                // store, branches, return, void call: nothing to assign
                _ => {}
            }

            // reclaim registers of operands whose live range just ended
            for &op in func.inst(i).operands() {
                if let Some(v) = op.as_inst() {
                    if let Some(r) = alloc.reg(v) {
                        if live.dead_at(v, at) && owner[r as usize] == Some(v) {
                            owner[r as usize] = None;
                        }
                    }
                }
            }
        }
    }
    alloc
}

/// No register is free: pick the register-resident value with the latest
/// range end and keep whichever of it and `i` has the shorter remaining
/// lifetime in the register.
fn spill_one(
    func: &Function,
    live: &BlockLiveness,
    owner: &mut [Option<InstId>; 3],
    alloc: &mut Allocation,
    i: InstId,
    _at: u32,
) {
    let mut victim: Option<(usize, InstId, u32)> = None;
    for (r, v) in owner.iter().enumerate() {
        let v = v.expect("spill selection with a free register");
        let end = live.range(v).expect("resident value has a range").end;
        if victim.map_or(true, |(_, _, best)| end > best) {
            victim = Some((r, v, end));
        }
    }
    let (r, victim, victim_end) = victim.expect("no register-resident values");
    let own_end = live.range(i).expect("value-producing instruction").end;

    if victim_end < own_end {
        // the current instruction has the longer remaining lifetime
        debug!("{}: spilling %{} (range end {})", func.name, i.0, own_end);
        alloc.set(i, Loc::Spill);
    } else {
        debug!(
            "{}: evicting %{} (range end {}) for %{}",
            func.name, victim.0, victim_end, i.0
        );
        alloc.set(victim, Loc::Spill);
        owner[r] = Some(i);
        alloc.set(i, Loc::Reg(Reg::ALL[r]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Value};

    #[test]
    fn overlapping_values_get_distinct_registers() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let l0 = b.load(cell);
        let l1 = b.load(cell);
        let l2 = b.load(cell);
        let s = b.add(Value::Inst(l0), Value::Inst(l1));
        let t = b.add(Value::Inst(s), Value::Inst(l2));
        b.ret(Value::Inst(t));
        let func = b.finish();

        let alloc = allocate_registers(&func);
        let r0 = alloc.reg(l0).unwrap();
        let r1 = alloc.reg(l1).unwrap();
        let r2 = alloc.reg(l2).unwrap();
        assert_ne!(r0, r1);
        assert_ne!(r0, r2);
        assert_ne!(r1, r2);
    }

    #[test]
    fn arithmetic_reuses_first_operand_register() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let l0 = b.load(cell);
        let s = b.add(Value::Inst(l0), Value::Literal(1));
        b.ret(Value::Inst(s));
        let func = b.finish();

        let alloc = allocate_registers(&func);
        assert_eq!(alloc.reg(s), alloc.reg(l0));
        assert!(alloc.reg(s).is_some());
    }

    #[test]
    fn arithmetic_with_literal_first_operand_stays_registerless() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let l0 = b.load(cell);
        let s = b.add(Value::Literal(1), Value::Inst(l0));
        b.store(Value::Inst(s), cell);
        b.ret(Value::Literal(0));
        let func = b.finish();

        let alloc = allocate_registers(&func);
        assert_eq!(alloc.get(s), None);
    }

    #[test]
    fn allocation_is_canonical() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let l0 = b.load(cell);
        b.store(Value::Inst(l0), cell);
        let l1 = b.load(cell);
        b.ret(Value::Inst(l1));
        let func = b.finish();

        let alloc = allocate_registers(&func);
        // first assignment is always the lowest-numbered register, and a
        // register freed by a dead value is handed out again
        assert_eq!(alloc.reg(l0), Some(Reg::Ebx));
        assert_eq!(alloc.reg(l1), Some(Reg::Ebx));
    }

    #[test]
    fn spill_prefers_latest_range_end() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let l0 = b.load(cell); // 0, used at 7 (latest end)
        let l1 = b.load(cell); // 1, used at 4
        let l2 = b.load(cell); // 2, used at 4 via add chain
        let l3 = b.load(cell); // 3: registers exhausted here
        let a = b.add(Value::Inst(l1), Value::Inst(l2)); // 4
        let s = b.add(Value::Inst(a), Value::Inst(l3)); // 5
        let t = b.add(Value::Inst(s), Value::Literal(0)); // 6
        let u = b.add(Value::Inst(t), Value::Inst(l0)); // 7
        b.ret(Value::Inst(u)); // 8
        let func = b.finish();

        let alloc = allocate_registers(&func);
        // l0 has the latest end among residents when l3 arrives and l3 dies
        // sooner, so l0 is evicted and l3 takes its register
        assert_eq!(alloc.get(l0), Some(Loc::Spill));
        assert_eq!(alloc.reg(l3), Some(Reg::Ebx));
    }
}
