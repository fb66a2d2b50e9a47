//! Per-block instruction numbering and live ranges.
//!
//! Numbering skips allocas and resets at every block boundary; a value's
//! range runs from its definition to its last in-block use, or is the
//! degenerate `(d, d)` when nothing consumes it. Ranges never cross
//! blocks — values are only carried between blocks through memory.

use std::collections::HashMap;

use crate::ir::{BlockId, Function, InstId, Opcode};

/// Half-open-feeling but inclusive span `[start, end]` in per-block
/// instruction numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub start: u32,
    pub end: u32,
}

/// Liveness of one basic block.
#[derive(Debug)]
pub struct BlockLiveness {
    index: HashMap<InstId, u32>,
    ranges: HashMap<InstId, LiveRange>,
}

impl BlockLiveness {
    pub fn compute(func: &Function, block: BlockId) -> Self {
        let mut index = HashMap::new();
        let mut n = 0u32;
        for &i in func.block(block).insts() {
            if func.opcode(i) == Opcode::Alloca {
                continue;
            }
            index.insert(i, n);
            n += 1;
        }

        let mut ranges = HashMap::new();
        for &i in func.block(block).insts() {
            if !func.opcode(i).produces_value() {
                continue;
            }
            let start = index[&i];
            let mut end = start;
            for site in func.uses(i) {
                // uses outside the block have no number here and do not
                // extend the range
                if let Some(&at) = index.get(&site.inst) {
                    end = end.max(at);
                }
            }
            ranges.insert(i, LiveRange { start, end });
        }
        Self { index, ranges }
    }

    pub fn index_of(&self, i: InstId) -> Option<u32> {
        self.index.get(&i).copied()
    }

    pub fn range(&self, i: InstId) -> Option<LiveRange> {
        self.ranges.get(&i).copied()
    }

    /// Whether `v`'s live range ends at or before position `at`.
    pub fn dead_at(&self, v: InstId, at: u32) -> bool {
        self.range(v).is_some_and(|r| r.end <= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Value};

    #[test]
    fn numbering_skips_allocas() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        b.store(Value::Literal(1), cell);
        let load = b.load(cell);
        b.ret(Value::Inst(load));
        let func = b.finish();

        let live = BlockLiveness::compute(&func, func.entry());
        assert_eq!(live.index_of(cell), None);
        assert_eq!(live.index_of(load), Some(1));
    }

    #[test]
    fn range_runs_to_last_use() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let cell = b.alloca();
        let load = b.load(cell); // 0
        let a = b.add(Value::Inst(load), Value::Literal(1)); // 1
        let c = b.add(Value::Inst(load), Value::Inst(a)); // 2
        b.ret(Value::Inst(c)); // 3
        let func = b.finish();

        let live = BlockLiveness::compute(&func, func.entry());
        assert_eq!(live.range(load), Some(LiveRange { start: 0, end: 2 }));
        assert_eq!(live.range(a), Some(LiveRange { start: 1, end: 2 }));
        assert_eq!(live.range(c), Some(LiveRange { start: 2, end: 3 }));
    }

    #[test]
    fn unused_value_has_degenerate_range() {
        let mut b = FunctionBuilder::new("f", None);
        b.block("entry");
        let r = b.call_read(); // 0
        b.ret(Value::Literal(0)); // 1
        let func = b.finish();

        let live = BlockLiveness::compute(&func, func.entry());
        assert_eq!(live.range(r), Some(LiveRange { start: 0, end: 0 }));
    }
}
