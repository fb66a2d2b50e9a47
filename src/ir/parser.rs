//! Textual IR parser.
//!
//! A small, line-oriented form of the program graph for writing compiler
//! tests (and feeding the CLI) without a front end:
//!
//! ```text
//! ; comments start with semicolon
//! compute(%n) {
//! entry:
//!     %a = alloca
//!     store %n, %a
//!     %0 = load %a
//!     %c = cmp lt %0, 10
//!     condbr %c, ^then, ^exit
//! then:
//!     call print, %0
//!     br ^exit
//! exit:
//!     ret %0
//! }
//! ```
//!
//! Blocks may be referenced (`^label`) before they are declared; values
//! must be declared before use, which the dialect's block-local value
//! discipline already guarantees. Printed graphs (`Function::print`) parse
//! back with canonical index names.

use std::collections::HashMap;

use thiserror::Error;

use super::{BlockId, Function, FunctionBuilder, InstId, Predicate, Value};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: {msg}")]
    Syntax { line: usize, msg: String },

    #[error("line {line}: unknown value %{name}")]
    UnknownValue { line: usize, name: String },

    #[error("line {line}: unknown block ^{name}")]
    UnknownBlock { line: usize, name: String },

    #[error("line {line}: value %{name} defined twice")]
    DuplicateValue { line: usize, name: String },
}

pub fn parse(text: &str) -> Result<Function, ParseError> {
    Parser::new(text).parse()
}

struct Parser<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
    param: Option<&'a str>,
    blocks: HashMap<&'a str, BlockId>,
    values: HashMap<&'a str, InstId>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(n, l)| (n + 1, l.split(';').next().unwrap_or("").trim()))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        Self {
            lines,
            pos: 0,
            param: None,
            blocks: HashMap::new(),
            values: HashMap::new(),
        }
    }

    fn err(&self, line: usize, msg: impl Into<String>) -> ParseError {
        ParseError::Syntax { line, msg: msg.into() }
    }

    fn parse(mut self) -> Result<Function, ParseError> {
        let (line, header) = *self
            .lines
            .first()
            .ok_or(ParseError::Syntax { line: 1, msg: "empty input".into() })?;
        self.pos = 1;

        let header = header
            .strip_suffix('{')
            .ok_or_else(|| self.err(line, "expected 'name(...) {'"))?
            .trim();
        let open = header
            .find('(')
            .ok_or_else(|| self.err(line, "expected '(' in function header"))?;
        let close = header
            .rfind(')')
            .ok_or_else(|| self.err(line, "expected ')' in function header"))?;
        let name = header[..open].trim();
        let param_text = header[open + 1..close].trim();
        let param = if param_text.is_empty() {
            None
        } else {
            Some(param_text.strip_prefix('%').ok_or_else(|| {
                self.err(line, "parameter must be written as %name")
            })?)
        };
        self.param = param;

        let mut builder = FunctionBuilder::new(name, param);

        // Declare every block up front so branches may reference forward.
        for &(line, text) in &self.lines[self.pos..] {
            if let Some(label) = text.strip_suffix(':') {
                let label = label.trim();
                if self.blocks.contains_key(label) {
                    return Err(self.err(line, format!("block ^{label} declared twice")));
                }
                self.blocks.insert(label, builder.block(label));
            }
        }
        if self.blocks.is_empty() {
            return Err(self.err(line, "function has no blocks"));
        }

        let mut in_block = false;
        while self.pos < self.lines.len() {
            let (line, text) = self.lines[self.pos];
            self.pos += 1;
            if text == "}" {
                if self.pos != self.lines.len() {
                    return Err(self.err(line, "text after closing '}'"));
                }
                return Ok(builder.finish());
            }
            if let Some(label) = text.strip_suffix(':') {
                builder.position_at(self.blocks[label.trim()]);
                in_block = true;
                continue;
            }
            if !in_block {
                return Err(self.err(line, "instruction before first block label"));
            }
            self.parse_inst(&mut builder, line, text)?;
        }
        Err(self.err(line, "missing closing '}'"))
    }

    fn parse_inst(
        &mut self,
        builder: &mut FunctionBuilder,
        line: usize,
        text: &'a str,
    ) -> Result<(), ParseError> {
        // `%name = op ...` or bare `op ...`
        let (def, body) = match text.split_once('=') {
            Some((lhs, rhs)) if lhs.trim_start().starts_with('%') => {
                let name = lhs.trim().strip_prefix('%').unwrap();
                (Some(name), rhs.trim())
            }
            _ => (None, text),
        };

        let (op, rest) = match body.split_once(char::is_whitespace) {
            Some((op, rest)) => (op, rest.trim()),
            None => (body, ""),
        };

        let id = match op {
            "alloca" => self.expect_operands(line, rest, 0).map(|_| builder.alloca())?,
            "load" => {
                let ops = self.expect_operands(line, rest, 1)?;
                builder.load(self.cell(line, ops[0])?)
            }
            "store" => {
                let ops = self.expect_operands(line, rest, 2)?;
                let value = self.value(line, ops[0])?;
                builder.store(value, self.cell(line, ops[1])?)
            }
            "add" | "sub" | "mul" => {
                let ops = self.expect_operands(line, rest, 2)?;
                let lhs = self.value(line, ops[0])?;
                let rhs = self.value(line, ops[1])?;
                match op {
                    "add" => builder.add(lhs, rhs),
                    "sub" => builder.sub(lhs, rhs),
                    _ => builder.mul(lhs, rhs),
                }
            }
            "cmp" => {
                let (pred, rest) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| self.err(line, "cmp needs a predicate and two operands"))?;
                let pred = match pred {
                    "eq" => Predicate::Eq,
                    "ne" => Predicate::Ne,
                    "lt" => Predicate::Lt,
                    "le" => Predicate::Le,
                    "gt" => Predicate::Gt,
                    "ge" => Predicate::Ge,
                    other => return Err(self.err(line, format!("unknown predicate '{other}'"))),
                };
                let ops = self.expect_operands(line, rest.trim(), 2)?;
                let lhs = self.value(line, ops[0])?;
                let rhs = self.value(line, ops[1])?;
                builder.cmp(pred, lhs, rhs)
            }
            "call" => {
                let mut parts = rest.splitn(2, ',');
                let callee = parts.next().unwrap_or("").trim();
                match callee {
                    "read" => builder.call_read(),
                    "print" => {
                        let arg = parts
                            .next()
                            .ok_or_else(|| self.err(line, "call print needs an argument"))?;
                        let arg = self.value(line, arg.trim())?;
                        builder.call_print(arg)
                    }
                    other => {
                        return Err(self.err(line, format!("unknown callee '{other}'")))
                    }
                }
            }
            "br" => {
                let ops = self.expect_operands(line, rest, 1)?;
                builder.br(self.target(line, ops[0])?)
            }
            "condbr" => {
                let ops = self.expect_operands(line, rest, 3)?;
                let cond = match self.value(line, ops[0])? {
                    Value::Inst(i) => i,
                    _ => return Err(self.err(line, "condbr condition must be a value name")),
                };
                let taken = self.target(line, ops[1])?;
                let fallthrough = self.target(line, ops[2])?;
                builder.cond_br(cond, taken, fallthrough)
            }
            "ret" => {
                let ops = self.expect_operands(line, rest, 1)?;
                let value = self.value(line, ops[0])?;
                builder.ret(value)
            }
            other => return Err(self.err(line, format!("unknown instruction '{other}'"))),
        };

        if let Some(name) = def {
            if self.values.insert(name, id).is_some() {
                return Err(ParseError::DuplicateValue { line, name: name.into() });
            }
        }
        Ok(())
    }

    fn expect_operands(
        &self,
        line: usize,
        rest: &'a str,
        count: usize,
    ) -> Result<Vec<&'a str>, ParseError> {
        let ops: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };
        if ops.len() != count {
            return Err(self.err(line, format!("expected {count} operands, found {}", ops.len())));
        }
        Ok(ops)
    }

    fn value(&self, line: usize, token: &str) -> Result<Value, ParseError> {
        if let Some(name) = token.strip_prefix('%') {
            if let Some(&id) = self.values.get(name) {
                return Ok(Value::Inst(id));
            }
            // a bare %name matching the parameter reads the incoming argument
            if self.param == Some(name) {
                return Ok(Value::Param);
            }
            return Err(ParseError::UnknownValue { line, name: name.into() });
        }
        token
            .parse::<i32>()
            .map(Value::Literal)
            .map_err(|_| self.err(line, format!("expected value or integer, found '{token}'")))
    }

    fn cell(&self, line: usize, token: &str) -> Result<InstId, ParseError> {
        match self.value(line, token)? {
            Value::Inst(i) => Ok(i),
            _ => Err(self.err(line, format!("'{token}' does not name a memory cell"))),
        }
    }

    fn target(&self, line: usize, token: &str) -> Result<BlockId, ParseError> {
        let name = token
            .strip_prefix('^')
            .ok_or_else(|| self.err(line, format!("branch target must be ^label, found '{token}'")))?;
        self.blocks
            .get(name)
            .copied()
            .ok_or_else(|| ParseError::UnknownBlock { line, name: name.into() })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn parses_straight_line_function() {
        let func = parse(
            "compute(%n) {\n\
             entry:\n\
                 %a = alloca\n\
                 store %n, %a\n\
                 %0 = load %a\n\
                 %1 = add %0, 1\n\
                 ret %1\n\
             }\n",
        )
        .unwrap();

        assert_eq!(func.name, "compute");
        assert!(func.has_param());
        assert_eq!(func.block(func.entry()).insts().len(), 5);
        let insts = func.block(func.entry()).insts();
        assert_eq!(func.opcode(insts[0]), Opcode::Alloca);
        assert_eq!(func.opcode(insts[3]), Opcode::Add);
        assert_eq!(func.inst(insts[3]).operand(1), Value::Literal(1));
    }

    #[test]
    fn parses_forward_branch_targets() {
        let func = parse(
            "loop() {\n\
             entry:\n\
                 br ^check\n\
             check:\n\
                 %c = cmp lt 1, 2\n\
                 condbr %c, ^check, ^done\n\
             done:\n\
                 ret 0\n\
             }\n",
        )
        .unwrap();

        assert_eq!(func.block_ids().count(), 3);
        let entry_term = func.block(func.entry()).insts()[0];
        assert_eq!(func.inst(entry_term).successors(), &[BlockId(1)]);
        let check = BlockId(1);
        let condbr = func.block(check).insts()[1];
        assert_eq!(func.inst(condbr).successors(), &[BlockId(1), BlockId(2)]);
    }

    #[test]
    fn printed_graph_parses_back() {
        let func = parse(
            "compute(%n) {\n\
             entry:\n\
                 %a = alloca\n\
                 store %n, %a\n\
                 %0 = load %a\n\
                 call print, %0\n\
                 %r = call read\n\
                 ret %r\n\
             }\n",
        )
        .unwrap();
        let reparsed = parse(&func.print()).unwrap();
        assert_eq!(reparsed.print(), func.print());
    }

    #[test]
    fn rejects_unknown_value() {
        let err = parse("f() {\nentry:\n    ret %x\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownValue { .. }));
    }

    #[test]
    fn accepts_negative_literals() {
        let func = parse("f() {\nentry:\n    %0 = add -3, 4\n    ret %0\n}\n").unwrap();
        let add = func.block(func.entry()).insts()[0];
        assert_eq!(func.inst(add).operand(0), Value::Literal(-3));
    }
}
