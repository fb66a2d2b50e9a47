//! Programmatic construction of the program graph.
//!
//! `FunctionBuilder` is the construction half of the input contract: the
//! front end's AST lowering (an external collaborator) and the unit tests
//! both build graphs through it. Blocks are created up front and filled by
//! positioning the builder, the way the textual parser does.

use super::{BlockId, Callee, Function, InstId, Opcode, Predicate, Value};

pub struct FunctionBuilder {
    func: Function,
    current: Option<BlockId>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, param: Option<&str>) -> Self {
        Self {
            func: Function::new(name.into(), param.map(str::to_owned)),
            current: None,
        }
    }

    /// Create a new block. The first block created is the entry block.
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = self.func.push_block(name.into());
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    /// Position subsequent instructions at the end of `block`.
    pub fn position_at(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    fn push(&mut self, opcode: Opcode, operands: Vec<Value>, succs: Vec<BlockId>) -> InstId {
        let block = self.current.expect("no block positioned");
        self.func.push_inst(block, opcode, operands, succs)
    }

    pub fn alloca(&mut self) -> InstId {
        self.push(Opcode::Alloca, vec![], vec![])
    }

    pub fn load(&mut self, cell: InstId) -> InstId {
        self.push(Opcode::Load, vec![Value::Inst(cell)], vec![])
    }

    pub fn store(&mut self, value: Value, cell: InstId) -> InstId {
        self.push(Opcode::Store, vec![value, Value::Inst(cell)], vec![])
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> InstId {
        self.push(Opcode::Add, vec![lhs, rhs], vec![])
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> InstId {
        self.push(Opcode::Sub, vec![lhs, rhs], vec![])
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> InstId {
        self.push(Opcode::Mul, vec![lhs, rhs], vec![])
    }

    pub fn cmp(&mut self, pred: Predicate, lhs: Value, rhs: Value) -> InstId {
        self.push(Opcode::Cmp(pred), vec![lhs, rhs], vec![])
    }

    pub fn call_print(&mut self, arg: Value) -> InstId {
        self.push(Opcode::Call(Callee::Print), vec![arg], vec![])
    }

    pub fn call_read(&mut self) -> InstId {
        self.push(Opcode::Call(Callee::Read), vec![], vec![])
    }

    pub fn br(&mut self, target: BlockId) -> InstId {
        self.push(Opcode::Br, vec![], vec![target])
    }

    /// Conditional branch; successors are ordered [taken, fallthrough].
    pub fn cond_br(&mut self, cond: InstId, taken: BlockId, fallthrough: BlockId) -> InstId {
        self.push(Opcode::CondBr, vec![Value::Inst(cond)], vec![taken, fallthrough])
    }

    pub fn ret(&mut self, value: Value) -> InstId {
        self.push(Opcode::Ret, vec![value], vec![])
    }

    pub fn finish(self) -> Function {
        self.func
    }
}
