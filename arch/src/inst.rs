use crate::{
    op::OpCode,
    operand::Operand,
    reg::Reg,
    value::Value,
};

use color_print::cformat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source position of the AST node an instruction was generated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inst {
    pub op: OpCode,
    pub dest: Option<Operand>,
    pub src: Option<Operand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Location>,
}

impl Inst {
    pub fn new(op: OpCode, dest: Option<Operand>, src: Option<Operand>) -> Self {
        Inst {
            op,
            dest,
            src,
            comment: None,
            origin: None,
        }
    }

    pub fn unary(op: OpCode, dest: impl Into<Operand>) -> Self {
        Self::new(op, Some(dest.into()), None)
    }

    pub fn binary(op: OpCode, dest: impl Into<Operand>, src: impl Into<Operand>) -> Self {
        Self::new(op, Some(dest.into()), Some(src.into()))
    }

    pub fn push(src: impl Into<Operand>) -> Self {
        Self::unary(OpCode::PUSH, src)
    }

    pub fn pop(dest: impl Into<Operand>) -> Self {
        Self::unary(OpCode::POP, dest)
    }

    pub fn mov(dest: impl Into<Operand>, src: impl Into<Operand>) -> Self {
        Self::binary(OpCode::MOV, dest, src)
    }

    pub fn ldi(dest: Reg, value: impl Into<Value>) -> Self {
        Self::binary(OpCode::LDI, dest, value.into())
    }

    pub fn jmp(target: Operand) -> Self {
        Self::new(OpCode::JMP, Some(target), None)
    }

    pub fn rjmp(target: Operand) -> Self {
        Self::new(OpCode::RJMP, Some(target), None)
    }

    /// Relative jump taken when `cond` is zero.
    pub fn rjmp_if_zero(target: Operand, cond: Reg) -> Self {
        Self::new(OpCode::RJMP, Some(target), Some(Operand::Reg(cond)))
    }

    pub fn call(target: Operand, argc: usize) -> Self {
        Self::binary(OpCode::CALL, target, Value::Int(argc as i64))
    }

    pub fn ret() -> Self {
        Self::new(OpCode::RET, None, None)
    }

    pub fn nop() -> Self {
        Self::new(OpCode::NOP, None, None)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn at(mut self, origin: Location) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.dest.iter().chain(self.src.iter())
    }

    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.dest.iter_mut().chain(self.src.iter_mut())
    }

    /// Operand count matches the opcode and no operand follows a gap.
    pub fn is_well_formed(&self) -> bool {
        let count = match (&self.dest, &self.src) {
            (None, Some(_)) => return false,
            (None, None) => 0,
            (Some(_), None) => 1,
            (Some(_), Some(_)) => 2,
        };
        self.op.operands().contains(&count)
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if let Some(dest) = &self.dest {
            write!(f, " {}", dest)?;
        }
        if let Some(src) = &self.src {
            write!(f, ", {}", src)?;
        }
        Ok(())
    }
}

fn operand_cformat(operand: &Operand) -> String {
    match operand {
        Operand::Imm(_) => cformat!("<y>{}</>", operand),
        Operand::Reg(_) => cformat!("<b>{}</>", operand),
        Operand::Ptr(_) => cformat!("<c>{}</>", operand),
        Operand::Extern(_) => cformat!("<m>{}</>", operand),
        Operand::Var { .. } | Operand::Label(_) => cformat!("<r,u>{}</>", operand),
    }
}

impl Inst {
    pub fn cformat(&self) -> String {
        let args = self
            .operands()
            .map(operand_cformat)
            .collect::<Vec<_>>()
            .join(", ");
        let text = cformat!("<r>{:<5}</>{}", self.op.to_string(), args);
        match &self.comment {
            Some(comment) => cformat!("{} <g>; {}</>", text, comment),
            None => text,
        }
    }
}
