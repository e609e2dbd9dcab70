//! Instruction set of the robot VM: values, scalar types, registers,
//! opcodes, operands and the ALU shared by the compiler and the emulator.

pub mod alu;
pub mod inst;
pub mod op;
pub mod operand;
pub mod reg;
pub mod types;
pub mod value;

pub use inst::{Inst, Location};
pub use op::OpCode;
pub use operand::{Base, Operand, Ptr};
pub use reg::Reg;
pub use types::{assignable, coerce_value, type_check, Type, TypeError};
pub use value::Value;
