// This module implements intra-block common-subexpression elimination over ordered
// instruction pairs. Two instructions with identical opcode and identical operand
// lists converge: every use of the later is redirected to the earlier. The aliasing
// guard: while scanning forward from an earlier load, encountering a store that
// shares any operand with the load aborts the scan for that earlier instruction,
// since the store may have invalidated the loaded value. The guard is intra-block
// only; no inter-block aliasing analysis is performed. Allocas are never an earlier
// candidate, and a pair only counts as a pipeline change when the later instruction
// actually had uses to redirect — redirecting a use-less instruction is a no-op and
// must not keep the fixpoint driver spinning.

//! Intra-block common-subexpression elimination.

use log::debug;

use crate::ir::{Function, Opcode, Value};

pub fn eliminate_common_subexpressions(func: &mut Function) -> bool {
    let mut changed = false;
    for b in func.block_ids() {
        let insts = func.block(b).insts().to_vec();
        for (pos, &first) in insts.iter().enumerate() {
            if func.opcode(first) == Opcode::Alloca {
                continue;
            }
            for &second in &insts[pos + 1..] {
                // a store sharing an operand with the earlier load may have
                // invalidated it; stop considering this earlier instruction
                if func.opcode(first) == Opcode::Load && func.opcode(second) == Opcode::Store {
                    let shares = func
                        .inst(first)
                        .operands()
                        .iter()
                        .any(|op| func.inst(second).operands().contains(op));
                    if shares {
                        break;
                    }
                }
                if func.opcode(second) != func.opcode(first) {
                    continue;
                }
                if func.inst(second).operands() != func.inst(first).operands() {
                    continue;
                }
                if func.use_count(second) == 0 {
                    continue;
                }
                debug!("cse: uses of %{} redirected to %{}", second.0, first.0);
                func.redirect_uses(second, Value::Inst(first));
                changed = true;
            }
        }
    }
    changed
}
