// This module plans the stack frame: a single forward walk of the function assigning
// every stack-resident entity a byte offset from the frame pointer. Allocas receive
// 4-byte slots in encounter order at monotonically decreasing offsets. The single
// incoming parameter lives at the fixed +8 left by the call/entry sequence (return
// address and saved %ebp), and the store that parks the parameter in its cell re-aims
// that cell at +8 — the store itself is skipped at emission. Every other store
// propagates its destination cell's offset onto the stored value (first store wins),
// and every load propagates the cell's offset onto its result, so any value still
// needing a memory location at emission time — a genuine cell or a spilled value —
// resolves to an offset here. The frame size is the accumulated slot count plus an
// extra 8 bytes when a parameter exists, used for the prologue stack adjustment.

//! Frame layout planning.

use crate::error::{CompileError, CompileResult};
use crate::ir::{Function, InstId, Opcode, Value};

/// Offset of the incoming parameter from `%ebp`: above the saved frame
/// pointer and the return address.
pub const PARAM_OFFSET: i32 = 8;

/// Byte offsets from `%ebp` for every stack-resident value, plus the
/// prologue frame size.
#[derive(Debug)]
pub struct FrameLayout {
    offsets: Vec<Option<i32>>,
    param_offset: Option<i32>,
    pub frame_size: i32,
}

impl FrameLayout {
    /// Frame slot of an instruction's value, if it has one.
    pub fn offset(&self, i: InstId) -> Option<i32> {
        self.offsets[i.index()]
    }

    /// Frame slot behind a value operand. Literals have none.
    pub fn value_offset(&self, v: Value) -> Option<i32> {
        match v {
            Value::Literal(_) => None,
            Value::Param => self.param_offset,
            Value::Inst(i) => self.offset(i),
        }
    }
}

/// Single forward walk assigning offsets and computing the frame size.
pub fn plan_frame(func: &Function) -> CompileResult<FrameLayout> {
    let mut offsets: Vec<Option<i32>> = vec![None; func.arena_len()];
    let mut local: i32 = 0;

    for b in func.block_ids() {
        for &i in func.block(b).insts() {
            match func.opcode(i) {
                Opcode::Alloca => {
                    local -= 4;
                    offsets[i.index()] = Some(local);
                }
                Opcode::Store => {
                    let value = func.inst(i).operand(0);
                    let cell = cell_operand(func, i, 1)?;
                    if value == Value::Param {
                        // the parameter's cell is the caller-pushed slot
                        offsets[cell.index()] = Some(PARAM_OFFSET);
                    } else {
                        let off = offsets[cell.index()]
                            .ok_or(CompileError::UnplannedCell { cell: cell.0 })?;
                        if let Value::Inst(v) = value {
                            // first store wins
                            offsets[v.index()].get_or_insert(off);
                        }
                    }
                }
                Opcode::Load => {
                    let cell = cell_operand(func, i, 0)?;
                    let off = offsets[cell.index()]
                        .ok_or(CompileError::UnplannedCell { cell: cell.0 })?;
                    offsets[i.index()] = Some(off);
                }
                _ => {}
            }
        }
    }

    let mut frame_size = -local;
    if func.has_param() {
        frame_size += 8;
    }
    Ok(FrameLayout {
        offsets,
        param_offset: func.has_param().then_some(PARAM_OFFSET),
        frame_size,
    })
}

fn cell_operand(func: &Function, i: InstId, pos: usize) -> CompileResult<InstId> {
    func.inst(i)
        .operand(pos)
        .as_inst()
        .ok_or(CompileError::InvalidCell {
            opcode: func.opcode(i),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Value};

    #[test]
    fn slots_decrease_in_encounter_order() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let c0 = b.alloca();
        let c1 = b.alloca();
        let c2 = b.alloca();
        b.store(Value::Literal(0), c0);
        b.ret(Value::Literal(0));
        let func = b.finish();

        let frame = plan_frame(&func).unwrap();
        assert_eq!(frame.offset(c0), Some(-4));
        assert_eq!(frame.offset(c1), Some(-8));
        assert_eq!(frame.offset(c2), Some(-12));
        assert_eq!(frame.frame_size, 12);
    }

    #[test]
    fn param_store_re_aims_cell_at_plus_eight() {
        let mut b = FunctionBuilder::new("f", Some("n"));
        b.block("entry");
        let cell = b.alloca();
        b.store(Value::Param, cell);
        let n = b.load(cell);
        b.ret(Value::Inst(n));
        let func = b.finish();

        let frame = plan_frame(&func).unwrap();
        assert_eq!(frame.offset(cell), Some(PARAM_OFFSET));
        assert_eq!(frame.offset(n), Some(PARAM_OFFSET));
        assert_eq!(frame.value_offset(Value::Param), Some(PARAM_OFFSET));
    }

    #[test]
    fn stores_and_loads_propagate_cell_offsets() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let r = b.call_read();
        b.store(Value::Inst(r), cell);
        let l = b.load(cell);
        b.ret(Value::Inst(l));
        let func = b.finish();

        let frame = plan_frame(&func).unwrap();
        assert_eq!(frame.offset(cell), Some(-4));
        assert_eq!(frame.offset(r), Some(-4));
        assert_eq!(frame.offset(l), Some(-4));
    }

    #[test]
    fn three_locals_one_param_frame_sizing() {
        let mut b = FunctionBuilder::new("f", Some("n"));
        b.block("entry");
        let pcell = b.alloca();
        b.store(Value::Param, pcell);
        let _l1 = b.alloca();
        let _l2 = b.alloca();
        let _l3 = b.alloca();
        b.ret(Value::Literal(0));
        let func = b.finish();

        let frame = plan_frame(&func).unwrap();
        // at least 12 bytes of local storage, parameter at +8
        assert!(frame.frame_size >= 12);
        assert_eq!(frame.value_offset(Value::Param), Some(8));
    }

    #[test]
    fn unplanned_cell_is_a_contract_violation() {
        // a load against a cell defined in a later block position than the
        // planner walk never happens with front-end output; force it by
        // loading from a cell that is only declared afterwards
        let mut b = FunctionBuilder::new("f", None);
        let entry = b.block("entry");
        let next = b.block("next");
        b.position_at(next);
        let cell = b.alloca();
        b.position_at(entry);
        let l = b.load(cell);
        b.ret(Value::Inst(l));
        b.position_at(next);
        b.ret(Value::Literal(0));
        let func = b.finish();

        assert!(matches!(
            plan_frame(&func),
            Err(CompileError::UnplannedCell { .. })
        ));
    }
}
