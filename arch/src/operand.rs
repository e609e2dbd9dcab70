use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

use crate::{reg::Reg, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum Base {
    /// Current frame (base pointer)
    EBP,
    /// Global region
    GBP,
}

/// A slot address: `base + offset (+ index register)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ptr {
    pub base: Base,
    pub offset: isize,
    pub index: Option<Reg>,
}

impl Ptr {
    pub fn frame(offset: isize) -> Self {
        Ptr {
            base: Base::EBP,
            offset,
            index: None,
        }
    }

    pub fn global(offset: usize) -> Self {
        Ptr {
            base: Base::GBP,
            offset: offset as isize,
            index: None,
        }
    }

    pub fn indexed(self, index: Reg) -> Self {
        Ptr {
            index: Some(index),
            ..self
        }
    }
}

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}", self.base, self.offset)?;
        if let Some(reg) = self.index {
            write!(f, "+{}", reg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Imm(Value),
    Reg(Reg),
    Ptr(Ptr),
    /// Host function called by name
    Extern(String),
    /// Variable reference awaiting a frame offset (code generation only)
    Var { name: String, index: Option<Reg> },
    /// Code address awaiting layout (code generation only)
    Label(String),
}

impl Operand {
    pub fn var(name: &str) -> Self {
        Operand::Var {
            name: name.to_string(),
            index: None,
        }
    }

    pub fn label(name: &str) -> Self {
        Operand::Label(name.to_string())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Operand::Var { .. } | Operand::Label(_))
    }
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Imm(value)
    }
}

impl From<Ptr> for Operand {
    fn from(ptr: Ptr) -> Self {
        Operand::Ptr(ptr)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(Value::Str(s)) => write!(f, "{:?}", s),
            Operand::Imm(v) => write!(f, "{}", v),
            Operand::Reg(reg) => write!(f, "{}", reg),
            Operand::Ptr(ptr) => write!(f, "{}", ptr),
            Operand::Extern(name) => write!(f, "{}", name),
            Operand::Var { name, index: None } => write!(f, "${}", name),
            Operand::Var {
                name,
                index: Some(reg),
            } => write!(f, "${}+{}", name, reg),
            Operand::Label(name) => write!(f, "@{}", name),
        }
    }
}
