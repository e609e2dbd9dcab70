//! Compiler from the robot language AST to VM instruction lists.

pub mod ast;
pub mod compile;
pub mod error;
pub mod link;
pub mod scope;
pub mod util;

pub use compile::{compile, Compiler, ExternDecl, HALT};
pub use error::{CompilerError, Error, ErrorKind, InternalError};
