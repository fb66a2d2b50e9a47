//! Dead-code elimination.
//!
//! Removes instructions whose result has no remaining uses. Stores, calls,
//! allocas, and terminators have effects beyond their result value and are
//! never removed regardless of use count. One forward sweep per call; uses
//! freed by an erasure earlier in the sweep are picked up by the next
//! pipeline round.

use log::debug;

use crate::ir::{Function, Opcode};

pub fn eliminate_dead_code(func: &mut Function) -> bool {
    let mut changed = false;
    for b in func.block_ids() {
        for i in func.block(b).insts().to_vec() {
            let opcode = func.opcode(i);
            if matches!(opcode, Opcode::Store | Opcode::Call(_) | Opcode::Alloca)
                || opcode.is_terminator()
            {
                continue;
            }
            if func.use_count(i) == 0 {
                debug!("dce: removing %{}", i.0);
                func.erase(i);
                changed = true;
            }
        }
    }
    changed
}
