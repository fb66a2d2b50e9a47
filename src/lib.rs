//! minicc - optimizing back end for a miniC-style language.
//!
//! The crate takes a control-flow graph of three-address instructions for a
//! single function and produces an optimized version of that graph plus a
//! linear 32-bit x86 assembly text implementing it under a three-register
//! budget with an `%ebp`-based stack frame.
//!
//! # Primary Usage
//!
//! ```
//! use minicc::{codegen, ir, opt};
//!
//! let func = ir::parse(
//!     "compute(%n) {\n\
//!      entry:\n\
//!          %a = alloca\n\
//!          store %n, %a\n\
//!          %0 = load %a\n\
//!          %1 = add %0, 1\n\
//!          ret %1\n\
//!      }\n",
//! )
//! .unwrap();
//! let mut module = ir::Module::new("compute.mc", func);
//! opt::optimize(&mut module);
//! let asm = codegen::generate_assembly(&module).unwrap();
//! assert!(asm.contains(".globl\tcompute"));
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - program graph arena, builder, textual parser, printer
//! - [`opt`] - optimization pipeline run to a whole-pipeline fixpoint
//! - [`regalloc`] - per-block liveness and greedy register allocation
//! - [`codegen`] - frame planning and instruction emission
//!
//! Data flows strictly forward: the pipeline transforms the graph, the
//! allocator and frame planner annotate it with locations, and the emitter
//! performs a single read-only pass producing text.

pub mod codegen;
pub mod error;
pub mod ir;
pub mod opt;
pub mod regalloc;

pub use codegen::{generate_assembly, FrameLayout};
pub use error::{CompileError, CompileResult};
pub use ir::{Function, FunctionBuilder, Module, ParseError, Value};
pub use opt::{optimize, optimize_function};
pub use regalloc::{allocate_registers, Allocation, Loc, Reg};
