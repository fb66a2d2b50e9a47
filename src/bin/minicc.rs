//! Back-end driver binary.
//!
//! Compiles a textual IR file: optimize to fixpoint, allocate, emit.
//! The front end (lexer/parser/AST lowering) lives elsewhere; this binary
//! consumes the graph form directly.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use minicc::{codegen, ir, opt};

#[derive(Parser)]
#[command(name = "minicc", about = "miniC optimizing back end")]
struct Args {
    /// Input file containing the textual program graph.
    input: PathBuf,

    /// Output assembly file.
    #[arg(short, long, default_value = "func.s")]
    output: PathBuf,

    /// Skip the optimization pipeline.
    #[arg(long)]
    no_opt: bool,

    /// Print the (optimized) graph to stdout instead of compiling.
    #[arg(long)]
    dump_ir: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let text = match fs::read_to_string(&args.input) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    let func = match ir::parse(&text) {
        Ok(func) => func,
        Err(e) => {
            eprintln!("error: {}: {e}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    let source_name = args.input.to_string_lossy().into_owned();
    let mut module = ir::Module::new(source_name, func);

    if !args.no_opt {
        opt::optimize(&mut module);
    }

    if args.dump_ir {
        print!("{}", module.function);
        return ExitCode::SUCCESS;
    }

    let asm = match codegen::generate_assembly(&module) {
        Ok(asm) => asm,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::write(&args.output, asm) {
        eprintln!("error: cannot write {}: {e}", args.output.display());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
