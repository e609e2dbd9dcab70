use arch::Inst;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use super::Hook;
use crate::model::Program;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub step: u64,
    pub pc: usize,
    pub inst: String,
    pub sp: usize,
    pub bp: usize,
}

pub type TraceLog = Rc<RefCell<Vec<TraceEvent>>>;

/// Collects one [`TraceEvent`] per executed instruction.
#[derive(Default)]
pub struct Recorder {
    log: TraceLog,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the events; stays valid after the recorder is attached.
    pub fn log(&self) -> TraceLog {
        Rc::clone(&self.log)
    }
}

impl Hook for Recorder {
    fn exec(&mut self, step: u64, pc: usize, inst: &Inst, program: &Program) {
        self.log.borrow_mut().push(TraceEvent {
            step,
            pc,
            inst: inst.to_string(),
            sp: program.sp(),
            bp: program.bp(),
        });
    }
}
