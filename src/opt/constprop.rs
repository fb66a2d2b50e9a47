// This module implements inter-block constant propagation as a reaching-stores
// dataflow problem. A store is a GEN for its block and KILLs every other store to the
// same memory cell anywhere in the function. The standard forward equations
// OUT[b] = GEN[b] ∪ (IN[b] − KILL[b]), IN[b] = ∪ OUT[pred] are iterated over the
// block graph to a fixpoint; afterwards each block is re-walked with a running
// reaching set seeded from IN[b]. A load is replaceable by a literal iff it has at
// least one reaching store to its cell and every one of them writes the same literal
// constant; such loads have their uses redirected to the literal and are erased at
// the end of the block walk. Loads whose reaching stores disagree, include a
// non-constant, or are absent entirely are left untouched.

//! Inter-block constant propagation (reaching stores).

use std::collections::HashSet;

use log::debug;

use crate::ir::{Function, InstId, Opcode, Value};

/// Destination cell of a store instruction.
fn store_cell(func: &Function, store: InstId) -> Value {
    func.inst(store).operand(1)
}

/// Drop from `set` every store killed by a new store to `cell`.
fn remove_kills(func: &Function, set: &mut HashSet<InstId>, cell: Value) {
    set.retain(|&s| store_cell(func, s) != cell);
}

pub fn propagate_constants(func: &mut Function) -> bool {
    let num_blocks = func.block_ids().count();

    // GEN: downward-exposed stores per block; also collect every store in
    // the function for KILL construction.
    let mut all_stores: Vec<InstId> = Vec::new();
    let mut gen: Vec<HashSet<InstId>> = Vec::with_capacity(num_blocks);
    for b in func.block_ids() {
        let mut exposed = HashSet::new();
        for &i in func.block(b).insts() {
            if func.opcode(i) == Opcode::Store {
                remove_kills(func, &mut exposed, store_cell(func, i));
                exposed.insert(i);
                all_stores.push(i);
            }
        }
        gen.push(exposed);
    }

    // KILL: for each store in the block, every other store to the same cell.
    let mut kill: Vec<HashSet<InstId>> = Vec::with_capacity(num_blocks);
    for b in func.block_ids() {
        let mut killed = HashSet::new();
        for &i in func.block(b).insts() {
            if func.opcode(i) == Opcode::Store {
                let cell = store_cell(func, i);
                killed.extend(
                    all_stores
                        .iter()
                        .copied()
                        .filter(|&s| s != i && store_cell(func, s) == cell),
                );
            }
        }
        kill.push(killed);
    }

    let preds = func.predecessors();

    // IN/OUT fixpoint over the block graph, blocks visited in order.
    let mut in_sets: Vec<HashSet<InstId>> = vec![HashSet::new(); num_blocks];
    let mut out_sets = gen.clone();
    let mut change = true;
    while change {
        change = false;
        for b in 0..num_blocks {
            for p in &preds[b] {
                let out_p = out_sets[p.index()].clone();
                in_sets[b].extend(out_p);
            }
            let mut new_out: HashSet<InstId> =
                in_sets[b].difference(&kill[b]).copied().collect();
            new_out.extend(gen[b].iter().copied());
            if new_out != out_sets[b] {
                out_sets[b] = new_out;
                change = true;
            }
        }
    }

    // Rewrite walk: maintain the running reaching set and replace loads
    // whose reaching stores all write the same literal.
    let mut changed = false;
    for b in func.block_ids() {
        let mut reaching = in_sets[b.index()].clone();
        let mut to_erase = Vec::new();
        for i in func.block(b).insts().to_vec() {
            match func.opcode(i) {
                Opcode::Store => {
                    remove_kills(func, &mut reaching, store_cell(func, i));
                    reaching.insert(i);
                }
                Opcode::Load => {
                    let cell = func.inst(i).operand(0);
                    let mut literal = None;
                    let mut replaceable = true;
                    for &s in &reaching {
                        if store_cell(func, s) != cell {
                            continue;
                        }
                        match (func.inst(s).operand(0), literal) {
                            (Value::Literal(c), None) => literal = Some(c),
                            (Value::Literal(c), Some(prev)) if c == prev => {}
                            _ => {
                                replaceable = false;
                                break;
                            }
                        }
                    }
                    if replaceable {
                        if let Some(c) = literal {
                            debug!("constprop: %{} -> {}", i.0, c);
                            func.redirect_uses(i, Value::Literal(c));
                            to_erase.push(i);
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }
        for i in to_erase {
            func.erase(i);
        }
    }
    changed
}
