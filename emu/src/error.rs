use arch::{alu::AluError, TypeError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("No instruction at pc {0}: the program has halted")]
    Halted(usize),

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Call to unregistered external function `{0}`")]
    UnregisteredExternal(String),

    #[error("Return without a call frame")]
    NoCallFrame,

    #[error("Address {1} of `{0}` is out of bounds")]
    OutOfBounds(String, i64),

    #[error("Invalid jump target: {0}")]
    InvalidJump(i64),

    #[error("Index {0} is not an integer")]
    InvalidIndex(String),

    #[error(transparent)]
    Alu(#[from] AluError),

    #[error(transparent)]
    Type(#[from] TypeError),

    // Compiler bugs: the instruction stream itself is broken
    #[error("Malformed instruction `{0}`: {1}")]
    Malformed(String, String),
}

impl RuntimeError {
    /// Errors caused by broken code generation rather than by the program.
    pub fn is_internal(&self) -> bool {
        matches!(self, RuntimeError::Malformed(..))
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Invalid image {0}")]
    Format(String, #[source] serde_yaml::Error),
}
