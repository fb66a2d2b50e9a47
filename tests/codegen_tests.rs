//! Integration tests for register allocation, frame planning, and emission.
//!
//! Programs go through the full pipeline — optimize, allocate, plan, emit —
//! and the resulting assembly text is checked for the exact sequences the
//! calling convention and the three-register budget require.

use minicc::ir::{self, Module, Opcode};
use minicc::{codegen, opt};

fn compile(text: &str) -> (Module, String) {
    let func = ir::parse(text).unwrap_or_else(|e| panic!("failed to parse test input: {e}"));
    let mut module = Module::new("test.mc", func);
    opt::optimize(&mut module);
    let asm = codegen::generate_assembly(&module).unwrap_or_else(|e| panic!("emission failed: {e}"));
    (module, asm)
}

/// Compile without the optimization pipeline, for tests that pin down
/// allocator behavior on graphs the pipeline would rewrite.
fn compile_unopt(text: &str) -> String {
    let func = ir::parse(text).unwrap_or_else(|e| panic!("failed to parse test input: {e}"));
    let module = Module::new("test.mc", func);
    codegen::generate_assembly(&module).unwrap_or_else(|e| panic!("emission failed: {e}"))
}

/// Helper to check if output contains expected patterns
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

fn count_opcode(module: &Module, opcode: Opcode) -> usize {
    let func = &module.function;
    func.block_ids()
        .flat_map(|b| func.block(b).insts().to_vec())
        .filter(|&i| func.opcode(i) == opcode)
        .count()
}

#[test]
fn end_to_end_increment_function() {
    // a = n + 1; return a;
    let (module, asm) = compile(
        "compute(%n) {\n\
         entry:\n\
             %a = alloca\n\
             %t = add %n, 1\n\
             store %t, %a\n\
             %r = load %a\n\
             ret %r\n\
         }\n",
    );

    // optimized graph: one allocation, one store, one add, one return
    assert_eq!(count_opcode(&module, Opcode::Alloca), 1);
    assert_eq!(count_opcode(&module, Opcode::Store), 1);
    assert_eq!(count_opcode(&module, Opcode::Add), 1);
    assert_eq!(count_opcode(&module, Opcode::Ret), 1);

    check_output_contains(
        &asm,
        &[
            "\t.file\t\"test.mc\"\n",
            "\t.globl\tcompute\n",
            "\t.type\tcompute, @function\n",
            "compute:\n.LFB0:\n",
            "\tpushl\t%ebp\n\tmovl\t%esp, %ebp\n",
            // the parameter is read from the caller-pushed slot at +8
            "\tmovl\t8(%ebp), %eax\n\taddl\t$1, %eax\n",
            // the registerless sum lands in a's negative-offset slot
            "\tmovl\t%eax, -4(%ebp)\n",
            // the result is returned through a register
            "\tmovl\t-4(%ebp), %ebx\n",
            "\tmovl\t%ebx, %eax\n",
            "\tpopl\t%ebx\n\tleave\n\tret\n",
        ],
    );
}

#[test]
fn parameter_travels_through_its_cell() {
    // front-end shape: the parameter is parked in a cell and re-read
    let (_, asm) = compile(
        "compute(%n) {\n\
         entry:\n\
             %p = alloca\n\
             store %n, %p\n\
             %a = alloca\n\
             %0 = load %p\n\
             %1 = add %0, 1\n\
             store %1, %a\n\
             %2 = load %a\n\
             ret %2\n\
         }\n",
    );

    check_output_contains(
        &asm,
        &[
            // the cell holding the parameter aliases the +8 argument slot
            "\tmovl\t8(%ebp), %ebx\n",
            // in-place accumulation into the load's register
            "\taddl\t$1, %ebx\n",
            // a's slot is the second allocation
            "\tmovl\t%ebx, -8(%ebp)\n",
        ],
    );
    // the parameter-parking store emits nothing: no write to +8
    assert!(!asm.contains(", 8(%ebp)"), "parameter slot was written:\n{asm}");
}

#[test]
fn prologue_adjusts_stack_by_frame_size() {
    let (_, asm) = compile(
        "f(%n) {\n\
         entry:\n\
             %p = alloca\n\
             store %n, %p\n\
             %l1 = alloca\n\
             %l2 = alloca\n\
             %l3 = alloca\n\
             ret 0\n\
         }\n",
    );
    // four 4-byte slots plus the parameter adjustment
    check_output_contains(&asm, &["\tsubl\t$24, %esp\n", "\tpushl\t%ebx\n"]);
}

#[test]
fn spilled_value_round_trips_through_its_slot() {
    // three long-lived reads occupy all registers; the fourth read outlives
    // the latest-ending resident, so it spills itself and is materialized
    // into its frame slot at the call site, then reloaded at its use
    let asm = compile_unopt(
        "f() {\n\
         entry:\n\
             %a = alloca\n\
             %b = alloca\n\
             %x = call read\n\
             %y = call read\n\
             %z = call read\n\
             %r = call read\n\
             store %x, %a\n\
             store %y, %a\n\
             store %z, %a\n\
             store %r, %b\n\
             ret %r\n\
         }\n",
    );

    check_output_contains(
        &asm,
        &[
            // definition: the spilled result leaves eax straight for its slot
            "\tmovl\t%eax, -8(%ebp)\n",
            // use: the return reloads from the same slot
            "\tmovl\t-8(%ebp), %eax\n",
        ],
    );
}

#[test]
fn overlapping_values_use_all_three_registers() {
    let asm = compile_unopt(
        "f() {\n\
         entry:\n\
             %x = call read\n\
             %y = call read\n\
             %z = call read\n\
             %s = add %x, %y\n\
             %t = add %s, %z\n\
             ret %t\n\
         }\n",
    );
    check_output_contains(
        &asm,
        &[
            "\tmovl\t%eax, %ebx\n",
            "\tmovl\t%eax, %ecx\n",
            "\tmovl\t%eax, %edx\n",
        ],
    );
}

#[test]
fn loop_lowers_to_labels_and_conditional_jumps() {
    let (_, asm) = compile(
        "count(%n) {\n\
         entry:\n\
             %p = alloca\n\
             store %n, %p\n\
             %i = alloca\n\
             store 0, %i\n\
             br ^check\n\
         check:\n\
             %0 = load %i\n\
             %1 = load %p\n\
             %c = cmp lt %0, %1\n\
             condbr %c, ^body, ^done\n\
         body:\n\
             %2 = load %i\n\
             call print, %2\n\
             %3 = load %i\n\
             %4 = add %3, 1\n\
             store %4, %i\n\
             br ^check\n\
         done:\n\
             %5 = load %i\n\
             ret %5\n\
         }\n",
    );

    check_output_contains(
        &asm,
        &[
            "\tjmp\t.L1\n",
            "\n.L1:\n",
            "\n.L2:\n",
            "\n.L3:\n",
            "\tjl\t.L2\n\tjmp\t.L3\n",
            "\tcall\tprint@PLT\n",
            "\taddl\t$4, %esp\n",
        ],
    );
}

#[test]
fn calls_preserve_the_register_file() {
    let (_, asm) = compile(
        "f() {\n\
         entry:\n\
             %r = call read\n\
             call print, %r\n\
             ret 0\n\
         }\n",
    );

    let save = "\tpushl\t%ebx\n\tpushl\t%ecx\n\tpushl\t%edx\n";
    let restore = "\tpopl\t%edx\n\tpopl\t%ecx\n\tpopl\t%ebx\n";
    assert_eq!(asm.matches(save).count(), 2, "both calls save the register file:\n{asm}");
    assert_eq!(asm.matches(restore).count(), 2, "both calls restore the register file:\n{asm}");
    check_output_contains(&asm, &["\tcall\tread@PLT\n", "\tpushl\t%ebx\n\tcall\tprint@PLT\n"]);
}

#[test]
fn folded_program_compiles_to_a_constant_return() {
    let (module, asm) = compile(
        "f() {\n\
         entry:\n\
             %a = alloca\n\
             store 5, %a\n\
             %0 = load %a\n\
             ret %0\n\
         }\n",
    );
    assert_eq!(count_opcode(&module, Opcode::Load), 0);
    check_output_contains(&asm, &["\tmovl\t$5, %eax\n\tpopl\t%ebx\n\tleave\n\tret\n"]);
}
