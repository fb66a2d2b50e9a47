// This module defines the program graph consumed by the back end: a Module holding the
// single user-defined function of a compilation unit, which is an ordered list of basic
// blocks of three-address instructions. Instructions live in an index arena on the
// Function (stable InstId indices, no pointer identity), operands are Value enums
// (literal constant, the incoming parameter, or another instruction's result), and
// branch targets live in a per-instruction successor list. Every defined value carries
// an explicit use-adjacency list of (consumer, operand position) pairs, which backs the
// two mutation primitives every optimization pass is written against: redirect_uses
// (rewire all consumers of one value to another) and erase (remove an instruction from
// its block). The module also provides an OpInfo metadata table per opcode and a
// printable form of the graph used by the test suite.

//! Program graph for the minicc back end.
//!
//! The graph is the input contract of the core: the front end (or the
//! textual parser in [`parser`]) builds it, the optimization pipeline
//! mutates it in place, and register allocation plus emission read it.
//! Instruction identity is a stable arena index, so every side table in
//! the back end is index-keyed.

use std::fmt;

pub mod builder;
pub mod parser;

pub use builder::FunctionBuilder;
pub use parser::{parse, ParseError};

/// Stable arena index of an instruction within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An operand: a literal constant, the incoming parameter, or the result
/// identity of another instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Literal(i32),
    Param,
    Inst(InstId),
}

impl Value {
    pub fn as_literal(self) -> Option<i32> {
        match self {
            Value::Literal(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(i) => Some(i),
            _ => None,
        }
    }
}

/// Signed relational predicates of the compare instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Predicate {
    pub fn name(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Lt => "lt",
            Predicate::Le => "le",
            Predicate::Gt => "gt",
            Predicate::Ge => "ge",
        }
    }
}

/// The dialect's two fixed external callees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callee {
    /// `void print(int)`
    Print,
    /// `int read(void)`
    Read,
}

impl Callee {
    pub fn name(self) -> &'static str {
        match self {
            Callee::Print => "print",
            Callee::Read => "read",
        }
    }

    pub fn returns_value(self) -> bool {
        matches!(self, Callee::Read)
    }
}

/// Instruction opcode. Operand conventions: `Load [cell]`,
/// `Store [value, cell]`, arithmetic and `Cmp` `[lhs, rhs]`,
/// `Call(Print) [arg]`, `Call(Read) []`, `Ret [value]`, `CondBr [cond]`.
/// Branch targets are successor-list entries, not operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Alloca,
    Load,
    Store,
    Add,
    Sub,
    Mul,
    Cmp(Predicate),
    Call(Callee),
    Br,
    CondBr,
    Ret,
}

/// Static per-opcode metadata.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub is_terminator: bool,
    /// Whether the instruction has a result identity usable as an operand.
    pub is_def: bool,
    pub op_count: u32,
    pub succ_count: u32,
}

impl Opcode {
    pub const fn info(self) -> OpInfo {
        use Opcode::*;
        match self {
            Alloca => OpInfo { name: "alloca", is_terminator: false, is_def: true, op_count: 0, succ_count: 0 },
            Load => OpInfo { name: "load", is_terminator: false, is_def: true, op_count: 1, succ_count: 0 },
            Store => OpInfo { name: "store", is_terminator: false, is_def: false, op_count: 2, succ_count: 0 },
            Add => OpInfo { name: "add", is_terminator: false, is_def: true, op_count: 2, succ_count: 0 },
            Sub => OpInfo { name: "sub", is_terminator: false, is_def: true, op_count: 2, succ_count: 0 },
            Mul => OpInfo { name: "mul", is_terminator: false, is_def: true, op_count: 2, succ_count: 0 },
            Cmp(_) => OpInfo { name: "cmp", is_terminator: false, is_def: true, op_count: 2, succ_count: 0 },
            Call(Callee::Print) => OpInfo { name: "call", is_terminator: false, is_def: false, op_count: 1, succ_count: 0 },
            Call(Callee::Read) => OpInfo { name: "call", is_terminator: false, is_def: true, op_count: 0, succ_count: 0 },
            Br => OpInfo { name: "br", is_terminator: true, is_def: false, op_count: 0, succ_count: 1 },
            CondBr => OpInfo { name: "condbr", is_terminator: true, is_def: false, op_count: 1, succ_count: 2 },
            Ret => OpInfo { name: "ret", is_terminator: true, is_def: false, op_count: 1, succ_count: 0 },
        }
    }

    pub fn is_terminator(self) -> bool {
        self.info().is_terminator
    }

    /// Whether the result is register-allocatable. Memory cells produced by
    /// `Alloca` have a result identity but never live in a register.
    pub fn produces_value(self) -> bool {
        self.info().is_def && !matches!(self, Opcode::Alloca)
    }
}

/// A use-site of a defined value: which instruction consumes it and at
/// which operand position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseSite {
    pub inst: InstId,
    pub operand: u32,
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub opcode: Opcode,
    operands: Vec<Value>,
    succs: Vec<BlockId>,
    block: BlockId,
    removed: bool,
}

impl Inst {
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn operand(&self, idx: usize) -> Value {
        self.operands[idx]
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    insts: Vec<InstId>,
}

impl Block {
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }
}

/// A function: an ordered list of basic blocks over one instruction arena,
/// plus at most one declared parameter.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Name of the single incoming parameter, if the function declares one.
    pub param: Option<String>,
    blocks: Vec<Block>,
    insts: Vec<Inst>,
    uses: Vec<Vec<UseSite>>,
}

impl Function {
    pub(crate) fn new(name: String, param: Option<String>) -> Self {
        Self {
            name,
            param,
            blocks: Vec::new(),
            insts: Vec::new(),
            uses: Vec::new(),
        }
    }

    pub fn has_param(&self) -> bool {
        self.param.is_some()
    }

    /// Entry block. Functions always have at least one block by the input
    /// contract.
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn block(&self, b: BlockId) -> &Block {
        &self.blocks[b.index()]
    }

    pub fn inst(&self, i: InstId) -> &Inst {
        &self.insts[i.index()]
    }

    pub fn opcode(&self, i: InstId) -> Opcode {
        self.insts[i.index()].opcode
    }

    /// Number of instruction slots in the arena, including erased ones.
    /// Side tables of the back end are sized by this.
    pub fn arena_len(&self) -> usize {
        self.insts.len()
    }

    pub fn uses(&self, i: InstId) -> &[UseSite] {
        &self.uses[i.index()]
    }

    pub fn use_count(&self, i: InstId) -> usize {
        self.uses[i.index()].len()
    }

    /// Predecessor list per block, derived from terminator successors.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for b in self.block_ids() {
            for &inst in self.block(b).insts() {
                for &succ in self.inst(inst).successors() {
                    if !preds[succ.index()].contains(&b) {
                        preds[succ.index()].push(b);
                    }
                }
            }
        }
        preds
    }

    pub(crate) fn push_block(&mut self, name: String) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            name,
            insts: Vec::new(),
        });
        id
    }

    pub(crate) fn push_inst(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        operands: Vec<Value>,
        succs: Vec<BlockId>,
    ) -> InstId {
        let id = InstId(self.insts.len() as u32);
        for (pos, op) in operands.iter().enumerate() {
            if let Value::Inst(def) = op {
                self.uses[def.index()].push(UseSite {
                    inst: id,
                    operand: pos as u32,
                });
            }
        }
        self.insts.push(Inst {
            opcode,
            operands,
            succs,
            block,
            removed: false,
        });
        self.uses.push(Vec::new());
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Redirect every consumer of `from` to read `to` instead. Returns the
    /// number of operand slots rewritten.
    pub fn redirect_uses(&mut self, from: InstId, to: Value) -> usize {
        let sites = std::mem::take(&mut self.uses[from.index()]);
        let count = sites.len();
        for site in sites {
            self.insts[site.inst.index()].operands[site.operand as usize] = to;
            if let Value::Inst(def) = to {
                self.uses[def.index()].push(site);
            }
        }
        count
    }

    /// Remove an instruction from its block. The caller must have redirected
    /// or dropped all uses first.
    pub fn erase(&mut self, i: InstId) {
        debug_assert!(self.uses[i.index()].is_empty(), "erasing a value with live uses");
        let operands = std::mem::take(&mut self.insts[i.index()].operands);
        for op in operands {
            if let Value::Inst(def) = op {
                self.uses[def.index()].retain(|site| site.inst != i);
            }
        }
        let block = self.insts[i.index()].block;
        self.blocks[block.index()].insts.retain(|&x| x != i);
        self.insts[i.index()].removed = true;
    }

    fn fmt_value(&self, v: Value) -> String {
        match v {
            Value::Literal(c) => c.to_string(),
            Value::Param => format!("%{}", self.param.as_deref().unwrap_or("arg")),
            Value::Inst(i) => format!("%{}", i.0),
        }
    }

    /// Printable form of the graph, in the same shape the textual parser
    /// accepts (value names are canonical arena indices).
    pub fn print(&self) -> String {
        let mut out = String::new();
        match &self.param {
            Some(p) => out.push_str(&format!("{}(%{}) {{\n", self.name, p)),
            None => out.push_str(&format!("{}() {{\n", self.name)),
        }
        for b in self.block_ids() {
            let block = self.block(b);
            out.push_str(&format!("{}:\n", block.name));
            for &id in block.insts() {
                let inst = self.inst(id);
                let info = inst.opcode.info();
                out.push_str("    ");
                if info.is_def {
                    out.push_str(&format!("%{} = ", id.0));
                }
                match inst.opcode {
                    Opcode::Cmp(pred) => {
                        out.push_str(&format!("cmp {}", pred.name()));
                    }
                    Opcode::Call(callee) => {
                        out.push_str(&format!("call {}", callee.name()));
                    }
                    _ => out.push_str(info.name),
                }
                let mut first = !matches!(inst.opcode, Opcode::Alloca | Opcode::Call(Callee::Read))
                    && info.op_count + info.succ_count > 0;
                // call print separates callee and argument with a comma
                if matches!(inst.opcode, Opcode::Call(Callee::Print)) {
                    out.push(',');
                }
                for &op in inst.operands() {
                    out.push_str(if first { " " } else { ", " });
                    first = false;
                    out.push_str(&self.fmt_value(op));
                }
                for &succ in inst.successors() {
                    out.push_str(if first { " " } else { ", " });
                    first = false;
                    out.push_str(&format!("^{}", self.block(succ).name));
                }
                out.push('\n');
            }
        }
        out.push_str("}\n");
        out
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.print())
    }
}

/// A compilation unit: a source name for the `.file` directive and exactly
/// one user-defined function.
#[derive(Debug, Clone)]
pub struct Module {
    pub source_name: String,
    pub function: Function,
}

impl Module {
    pub fn new(source_name: impl Into<String>, function: Function) -> Self {
        Self {
            source_name: source_name.into(),
            function,
        }
    }
}
