//! Code generation: frame planning, label assignment, and emission.
//!
//! [`generate_assembly`] is the one-call surface over the back half of the
//! pipeline: allocate registers, plan the frame, emit. The pieces stay
//! public for tests that want to inspect an individual stage.

use crate::error::CompileResult;
use crate::ir::Module;
use crate::regalloc::allocate_registers;

pub mod emit;
pub mod frame;

pub use emit::{block_labels, emit};
pub use frame::{plan_frame, FrameLayout, PARAM_OFFSET};

/// Lower an (already optimized) module to assembly text.
pub fn generate_assembly(module: &Module) -> CompileResult<String> {
    let alloc = allocate_registers(&module.function);
    let frame = plan_frame(&module.function)?;
    log::debug!(
        "{}: frame size {} bytes",
        module.function.name,
        frame.frame_size
    );
    emit(module, &alloc, &frame)
}
