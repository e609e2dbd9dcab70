pub mod dump;
pub mod record;

use arch::Inst;

use crate::model::Program;

/// Observer of the instruction cycle. Hooks only read machine state.
pub trait Hook {
    fn init(&mut self, _program: &Program) {}
    /// Called after the instruction at `pc` has executed successfully.
    fn exec(&mut self, step: u64, pc: usize, inst: &Inst, program: &Program);
}
