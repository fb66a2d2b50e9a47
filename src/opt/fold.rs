//! Constant folding for add/sub/mul with two literal operands.
//!
//! The folded instruction keeps its place in the block; its uses are
//! redirected to the computed literal and dead-code elimination removes
//! the husk in the same pipeline round. Arithmetic wraps, matching the
//! two's-complement behavior of the target.

use log::debug;

use crate::ir::{Function, Opcode, Value};

pub fn fold_constants(func: &mut Function) -> bool {
    let mut changed = false;
    for b in func.block_ids() {
        for i in func.block(b).insts().to_vec() {
            let opcode = func.opcode(i);
            if !matches!(opcode, Opcode::Add | Opcode::Sub | Opcode::Mul) {
                continue;
            }
            let (lhs, rhs) = (func.inst(i).operand(0), func.inst(i).operand(1));
            let (Value::Literal(x), Value::Literal(y)) = (lhs, rhs) else {
                continue;
            };
            let folded = match opcode {
                Opcode::Add => x.wrapping_add(y),
                Opcode::Sub => x.wrapping_sub(y),
                _ => x.wrapping_mul(y),
            };
            debug!("fold: %{} -> {}", i.0, folded);
            func.redirect_uses(i, Value::Literal(folded));
            changed = true;
        }
    }
    changed
}
