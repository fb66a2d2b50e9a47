// This module lowers the optimized, allocated graph into 32-bit x86 assembly text in
// one read-only pass. Every operand resolves to one of three forms — immediate
// literal, register, or frame-relative memory — chosen from the register map and the
// frame layout in that order. Arithmetic computes into the assigned register when one
// exists and otherwise into the scratch register %eax with an immediate store back to
// the result's frame slot; spilled values never appear as register operands, they are
// always routed through %eax and a memory operand. Calls preserve all three
// general-purpose registers around the call site, since the per-block allocator has
// no notion of call clobbering, and pass at most one scalar argument on the stack.
// Conditional branches lower the condition's comparison predicate to the matching
// conditional jump followed by an unconditional jump to the fallthrough target. A
// value that needs a memory location but has none, and a branch condition that is not
// a comparison, are broken invariants from earlier stages: emission aborts with a
// contract-violation error rather than working around them.

//! Instruction emission.
//!
//! Produces the final assembly text: file header, prologue, one label per
//! non-entry block, the lowered instruction stream, and a per-return
//! epilogue. The output dialect is AT&T syntax as consumed by the GNU
//! assembler, `print`/`read` are the two fixed external callees reached
//! through the PLT.

use std::fmt;

use crate::codegen::frame::FrameLayout;
use crate::error::{CompileError, CompileResult};
use crate::ir::{BlockId, Callee, Function, InstId, Module, Opcode, Predicate, Value};
use crate::regalloc::{Allocation, Reg};

/// Resolved operand form, in resolution order: literal, register, memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Imm(i32),
    Reg(Reg),
    Mem(i32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(c) => write!(f, "${c}"),
            Operand::Reg(r) => write!(f, "%{}", r.name()),
            Operand::Mem(off) => write!(f, "{off}(%ebp)"),
        }
    }
}

/// Computation destination: an allocated register or the scratch register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dest {
    Reg(Reg),
    Scratch,
}

impl Dest {
    fn name(self) -> &'static str {
        match self {
            Dest::Reg(r) => r.name(),
            Dest::Scratch => "eax",
        }
    }
}

/// Assign every block its textual label: the entry keeps the fixed `.LFB0`,
/// the rest are numbered in block order.
pub fn block_labels(func: &Function) -> Vec<String> {
    func.block_ids()
        .map(|b| {
            if b == func.entry() {
                ".LFB0".to_string()
            } else {
                format!(".L{}", b.0)
            }
        })
        .collect()
}

pub fn emit(module: &Module, alloc: &Allocation, frame: &FrameLayout) -> CompileResult<String> {
    Emitter {
        func: &module.function,
        alloc,
        frame,
        labels: block_labels(&module.function),
        out: String::new(),
    }
    .run(&module.source_name)
}

struct Emitter<'a> {
    func: &'a Function,
    alloc: &'a Allocation,
    frame: &'a FrameLayout,
    labels: Vec<String>,
    out: String,
}

impl<'a> Emitter<'a> {
    fn run(mut self, source_name: &str) -> CompileResult<String> {
        self.directives(source_name);
        self.out
            .push_str(&format!("\tsubl\t${}, %esp\n", self.frame.frame_size));
        self.out.push_str("\tpushl\t%ebx\n");

        for b in self.func.block_ids() {
            if b != self.func.entry() {
                self.out.push_str(&format!("\n{}:\n", self.labels[b.index()]));
            }
            for &i in self.func.block(b).insts() {
                self.inst(i)?;
            }
        }
        Ok(self.out)
    }

    fn directives(&mut self, source_name: &str) {
        let name = &self.func.name;
        self.out.push_str(&format!("\t.file\t\"{source_name}\"\n"));
        self.out.push_str("\t.text\n");
        self.out.push_str(&format!("\t.globl\t{name}\n"));
        self.out.push_str(&format!("\t.type\t{name}, @function\n"));
        self.out.push_str(&format!("{name}:\n"));
        self.out.push_str(".LFB0:\n");
        self.out.push_str("\tpushl\t%ebp\n");
        self.out.push_str("\tmovl\t%esp, %ebp\n");
    }

    fn epilogue(&mut self) {
        self.out.push_str("\tpopl\t%ebx\n");
        self.out.push_str("\tleave\n");
        self.out.push_str("\tret\n");
    }

    /// Resolve a value operand: literal, then register, then frame slot.
    fn resolve(&self, v: Value) -> CompileResult<Operand> {
        if let Value::Literal(c) = v {
            return Ok(Operand::Imm(c));
        }
        if let Value::Inst(i) = v {
            if let Some(r) = self.alloc.reg(i) {
                return Ok(Operand::Reg(r));
            }
        }
        match self.frame.value_offset(v) {
            Some(off) => Ok(Operand::Mem(off)),
            None => Err(CompileError::MissingStackSlot {
                value: self.describe(v),
            }),
        }
    }

    fn describe(&self, v: Value) -> String {
        match v {
            Value::Literal(c) => c.to_string(),
            Value::Param => format!("%{}", self.func.param.as_deref().unwrap_or("arg")),
            Value::Inst(i) => format!("%{}", i.0),
        }
    }

    /// Frame slot of an instruction's own result.
    fn result_slot(&self, i: InstId) -> CompileResult<i32> {
        self.frame
            .offset(i)
            .ok_or_else(|| CompileError::MissingStackSlot {
                value: format!("%{}", i.0),
            })
    }

    fn cell_slot(&self, cell: Value, opcode: Opcode) -> CompileResult<i32> {
        let id = cell.as_inst().ok_or(CompileError::InvalidCell { opcode })?;
        self.frame
            .offset(id)
            .ok_or(CompileError::UnplannedCell { cell: id.0 })
    }

    fn inst(&mut self, i: InstId) -> CompileResult<()> {
        match self.func.opcode(i) {
            Opcode::Alloca => {} // space was planned, nothing to execute
            Opcode::Load => self.load(i)?,
            Opcode::Store => self.store(i)?,
            Opcode::Add => self.arith(i, "addl")?,
            Opcode::Sub => self.arith(i, "subl")?,
            Opcode::Mul => self.arith(i, "imull")?,
            Opcode::Cmp(_) => self.compare(i)?,
            Opcode::Call(callee) => self.call(i, callee)?,
            Opcode::Br => {
                let target = self.func.inst(i).successors()[0];
                self.out.push_str(&format!("\tjmp\t{}\n", self.label(target)));
            }
            Opcode::CondBr => self.cond_br(i)?,
            Opcode::Ret => {
                let src = self.resolve(self.func.inst(i).operand(0))?;
                self.out.push_str(&format!("\tmovl\t{src}, %eax\n"));
                self.epilogue();
            }
        }
        Ok(())
    }

    fn label(&self, b: BlockId) -> &str {
        &self.labels[b.index()]
    }

    fn load(&mut self, i: InstId) -> CompileResult<()> {
        // registerless loads emit nothing: their consumers read the cell's
        // frame slot directly
        if let Some(r) = self.alloc.reg(i) {
            let off = self.cell_slot(self.func.inst(i).operand(0), Opcode::Load)?;
            self.out
                .push_str(&format!("\tmovl\t{off}(%ebp), %{}\n", r.name()));
        }
        Ok(())
    }

    fn store(&mut self, i: InstId) -> CompileResult<()> {
        let value = self.func.inst(i).operand(0);
        if value == Value::Param {
            // the parameter already sits in the cell's slot at +8
            return Ok(());
        }
        let off = self.cell_slot(self.func.inst(i).operand(1), Opcode::Store)?;
        match self.resolve(value)? {
            src @ (Operand::Imm(_) | Operand::Reg(_)) => {
                self.out.push_str(&format!("\tmovl\t{src}, {off}(%ebp)\n"));
            }
            Operand::Mem(src_off) => {
                self.out
                    .push_str(&format!("\tmovl\t{src_off}(%ebp), %eax\n"));
                self.out.push_str(&format!("\tmovl\t%eax, {off}(%ebp)\n"));
            }
        }
        Ok(())
    }

    fn dest(&self, i: InstId) -> Dest {
        match self.alloc.reg(i) {
            Some(r) => Dest::Reg(r),
            None => Dest::Scratch,
        }
    }

    /// Move the first operand into the destination, eliding the move when it
    /// is already resident there.
    fn first_operand_into(&mut self, src: Operand, dest: Dest) {
        if let (Operand::Reg(r), Dest::Reg(d)) = (src, dest) {
            if r == d {
                return;
            }
        }
        self.out
            .push_str(&format!("\tmovl\t{src}, %{}\n", dest.name()));
    }

    fn arith(&mut self, i: InstId, mnemonic: &str) -> CompileResult<()> {
        let dest = self.dest(i);
        let lhs = self.resolve(self.func.inst(i).operand(0))?;
        let rhs = self.resolve(self.func.inst(i).operand(1))?;

        self.first_operand_into(lhs, dest);
        self.out
            .push_str(&format!("\t{mnemonic}\t{rhs}, %{}\n", dest.name()));

        if dest == Dest::Scratch {
            let off = self.result_slot(i)?;
            self.out.push_str(&format!("\tmovl\t%eax, {off}(%ebp)\n"));
        }
        Ok(())
    }

    /// Compares leave their result in the flags for the adjacent conditional
    /// branch; there is no store-back.
    fn compare(&mut self, i: InstId) -> CompileResult<()> {
        let dest = self.dest(i);
        let lhs = self.resolve(self.func.inst(i).operand(0))?;
        let rhs = self.resolve(self.func.inst(i).operand(1))?;

        self.first_operand_into(lhs, dest);
        self.out
            .push_str(&format!("\tcmpl\t{rhs}, %{}\n", dest.name()));
        Ok(())
    }

    fn call(&mut self, i: InstId, callee: Callee) -> CompileResult<()> {
        // the allocator has no notion of call clobbering: preserve all three
        // general-purpose registers around every call site
        self.out.push_str("\tpushl\t%ebx\n");
        self.out.push_str("\tpushl\t%ecx\n");
        self.out.push_str("\tpushl\t%edx\n");

        if callee == Callee::Print {
            let arg = self.resolve(self.func.inst(i).operand(0))?;
            self.out.push_str(&format!("\tpushl\t{arg}\n"));
        }
        self.out
            .push_str(&format!("\tcall\t{}@PLT\n", callee.name()));
        if callee == Callee::Print {
            self.out.push_str("\taddl\t$4, %esp\n");
        }

        self.out.push_str("\tpopl\t%edx\n");
        self.out.push_str("\tpopl\t%ecx\n");
        self.out.push_str("\tpopl\t%ebx\n");

        if callee.returns_value() {
            match self.alloc.reg(i) {
                Some(r) => self
                    .out
                    .push_str(&format!("\tmovl\t%eax, %{}\n", r.name())),
                None => {
                    let off = self.result_slot(i)?;
                    self.out.push_str(&format!("\tmovl\t%eax, {off}(%ebp)\n"));
                }
            }
        }
        Ok(())
    }

    fn cond_br(&mut self, i: InstId) -> CompileResult<()> {
        let cond = self.func.inst(i).operand(0);
        let pred = match cond.as_inst().map(|c| self.func.opcode(c)) {
            Some(Opcode::Cmp(pred)) => pred,
            _ => {
                return Err(CompileError::InvalidCondition {
                    value: self.describe(cond),
                })
            }
        };
        let jcc = match pred {
            Predicate::Eq => "je",
            Predicate::Ne => "jne",
            Predicate::Lt => "jl",
            Predicate::Le => "jle",
            Predicate::Gt => "jg",
            Predicate::Ge => "jge",
        };
        let succs = self.func.inst(i).successors();
        let (taken, fallthrough) = (succs[0], succs[1]);
        self.out
            .push_str(&format!("\t{jcc}\t{}\n", self.label(taken)));
        self.out
            .push_str(&format!("\tjmp\t{}\n", self.label(fallthrough)));
        Ok(())
    }
}
