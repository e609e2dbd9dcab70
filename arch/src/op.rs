use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, Display)]
pub enum OpCode {
    ADD,
    SUB,
    MUL,
    DIV,
    AND,
    OR,
    XOR,
    INC,
    DEC,
    CP,
    MOV,
    LDI,
    PUSH,
    POP,
    JMP,
    RJMP,
    CALL,
    RET,
    #[default]
    NOP,
}

impl OpCode {
    /// Number of operands the instruction accepts.
    pub fn operands(&self) -> RangeInclusive<usize> {
        use OpCode::*;
        match self {
            ADD | SUB | MUL | DIV | AND | OR | XOR | CP | MOV | LDI => 2..=2,
            INC | DEC | PUSH | POP => 1..=1,
            JMP | RJMP => 1..=2,
            CALL => 2..=2,
            RET | NOP => 0..=0,
        }
    }
}
