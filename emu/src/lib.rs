//! Step-debuggable virtual machine executing compiled instruction lists.

pub mod builtins;
pub mod error;
pub mod hooks;
pub mod image;
pub mod model;
pub mod symbols;

pub use builtins::{register_builtins, Console};
pub use error::{ImageError, RuntimeError};
pub use hooks::{dump::Dump, record::Recorder, record::TraceEvent, Hook};
pub use image::Image;
pub use model::{Frame, HostFn, Program};
pub use symbols::{CodeEntry, DataEntry, FrameEntry, SymbolMap};
