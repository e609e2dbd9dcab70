use arch::{alu::AluError, Location, Type, TypeError};
use thiserror::Error;

/// What went wrong in the user's program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("`{0}` is already declared")]
    AlreadyDeclared(String),

    #[error("`{0}` is not declared")]
    NotDeclared(String),

    #[error("Type mismatch: cannot assign {found} to {expected}")]
    TypeMismatch { expected: Type, found: Type },

    #[error(transparent)]
    Coercion(#[from] TypeError),

    #[error("Only variable and function declarations are allowed at the top level")]
    IllegalTopLevel,

    #[error("{0} is not allowed inside a function body")]
    IllegalStatement(&'static str),

    #[error("Left side of an assignment must be a variable or an array element")]
    IllegalAssignmentTarget,

    #[error("Function calls are not allowed in global initializers")]
    CallInGlobalInitializer,

    #[error("Global initializer is not a constant expression")]
    NonConstantInitializer,

    #[error("Cannot evaluate global initializer: {0}")]
    ConstEval(#[from] AluError),

    #[error("`{name}` takes {expected} argument(s) but {found} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`{0}` is not a function")]
    NotAFunction(String),

    #[error("`{0}` is a function, not a variable")]
    NotAVariable(String),

    #[error("Only named functions can be called")]
    NotCallable,

    #[error("`{0}` returns void and has no value")]
    VoidValue(String),

    #[error("Variables cannot be declared void")]
    VoidVariable,

    #[error("Operator `{op}` cannot be applied to {ty}")]
    InvalidOperand { op: String, ty: Type },

    #[error("`{0}` is not an array")]
    NotAnArray(String),

    #[error("Array `{0}` cannot be used as a value")]
    ArrayAsValue(String),

    #[error("Array `{0}` needs a positive length")]
    ArrayLength(String),

    #[error("Array `{0}` cannot have an initializer")]
    ArrayInitializer(String),

    #[error("Parameter `{0}` cannot be an array")]
    ArrayParameter(String),

    #[error("Parameter `{0}` cannot have a default value")]
    ParameterInitializer(String),

    #[error("`main` cannot take parameters")]
    MainParameters,

    #[error("`break` outside of a loop")]
    BreakOutsideLoop,

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,

    #[error("`{0}` must return a value")]
    MissingReturnValue(String),

    #[error("`{0}` returns void and cannot return a value")]
    UnexpectedReturnValue(String),
}

impl ErrorKind {
    pub fn at(self, location: Location) -> CompilerError {
        CompilerError {
            kind: self,
            location,
        }
    }
}

/// A user-facing compile failure attributed to a source location.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: {kind}")]
pub struct CompilerError {
    pub kind: ErrorKind,
    pub location: Location,
}

impl CompilerError {
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Broken code generation. Never attributed to the user's source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    #[error("Unresolved variable `{1}` in `{0}`")]
    UnresolvedVariable(String, String),

    #[error("Undefined label: {0}")]
    UndefinedLabel(String),

    #[error("Label redefinition: {0}")]
    LabelRedefinition(String),

    #[error("Pending operand left in `{1}` at {0}")]
    PendingOperand(usize, String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error("Internal compiler error: {0}")]
    Internal(#[from] InternalError),
}

impl Error {
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// Source location of a user-facing error.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Compiler(e) => Some(e.location),
            Error::Internal(_) => None,
        }
    }
}
