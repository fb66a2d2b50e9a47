// This module drives the optimization pipeline of the back end: constant propagation,
// common-subexpression elimination, constant folding, and dead-code elimination, run
// repeatedly in that fixed order until a full round reports no change. Each pass is a
// function from a mutable program graph to a bool recording whether it rewrote
// anything, and all of them mutate the graph exclusively through the ir module's
// redirect_uses/erase primitives. The pipeline is a whole-pipeline fixpoint: a change
// made by any pass re-arms all four, since e.g. a propagated constant exposes new
// folding opportunities and folded husks become dead code.

//! Optimization pipeline.
//!
//! Four passes to a pipeline-level fixpoint. Re-running the pipeline on
//! its own output performs no further change (idempotence), which the
//! integration tests rely on.

use log::debug;

use crate::ir::{Function, Module};

pub mod constprop;
pub mod cse;
pub mod dce;
pub mod fold;

pub use constprop::propagate_constants;
pub use cse::eliminate_common_subexpressions;
pub use dce::eliminate_dead_code;
pub use fold::fold_constants;

/// Optimize every function of the module in place.
pub fn optimize(module: &mut Module) {
    optimize_function(&mut module.function);
}

/// Run the pass pipeline on one function until a full round changes nothing.
pub fn optimize_function(func: &mut Function) {
    let mut rounds = 0u32;
    loop {
        rounds += 1;
        let mut changed = propagate_constants(func);
        changed |= eliminate_common_subexpressions(func);
        changed |= fold_constants(func);
        changed |= eliminate_dead_code(func);
        if !changed {
            break;
        }
    }
    debug!("{}: pipeline fixpoint after {} round(s)", func.name, rounds);
}
