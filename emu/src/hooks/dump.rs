use arch::Inst;
use color_print::cprintln;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use super::Hook;
use crate::{error::ImageError, model::Program};

/// Prints machine state at configured program counters (or at every step).
#[derive(Debug)]
pub struct Dump {
    file: Option<String>,
    all: bool,
    list: List,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct List(HashMap<usize, Config>);

#[derive(Debug, Default, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    stack: bool,
    #[serde(default)]
    globals: bool,
    #[serde(default)]
    locals: bool,
}

impl Dump {
    pub fn arg(file: Option<String>, all: bool) -> Result<Self, ImageError> {
        match file {
            Some(fname) => {
                let file =
                    File::open(&fname).map_err(|e| ImageError::FileOpen(fname.clone(), e))?;
                let list: List = serde_yaml::from_reader(BufReader::new(file))
                    .map_err(|e| ImageError::Format(fname.clone(), e))?;
                Ok(Self {
                    file: Some(fname),
                    list,
                    all,
                })
            }
            None => Ok(Self {
                file,
                list: List::default(),
                all,
            }),
        }
    }

    fn get(&self, pc: usize) -> Option<&Config> {
        self.list.0.get(&pc)
    }
}

impl Hook for Dump {
    fn init(&mut self, _program: &Program) {
        if self.all {
            println!(" * Dump all");
        }
        if let Some(fname) = &self.file {
            println!(" * Dump[{}] {:?}", self.list.0.len(), fname);
        }
    }

    fn exec(&mut self, step: u64, pc: usize, inst: &Inst, program: &Program) {
        if let Some(cfg) = self.get(pc) {
            self.print_inst(step, pc, inst);
            self.print_reg(program);
            if cfg.stack {
                self.print_stack(program);
            }
            if cfg.globals {
                self.print_globals(program);
            }
            if cfg.locals {
                self.print_locals(program);
            }
        } else if self.all {
            self.print_inst(step, pc, inst);
            self.print_reg(program);
        }
    }
}

impl Dump {
    fn print_inst(&self, step: u64, pc: usize, inst: &Inst) {
        cprintln!("[{:0>4}] <s>{:0>4}</> {}", step, pc, inst.cformat());
    }

    fn print_reg(&self, program: &Program) {
        println!(" +-----------------------------------------------+");
        println!(
            " | pc: {:<6} sp: {:<6} bp: {:<6} depth: {:<6}|",
            program.pc(),
            program.sp(),
            program.bp(),
            program.call_stack().len()
        );
        let regs: Vec<String> = program
            .registers()
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect();
        for row in regs.chunks(4) {
            println!(" | {:<46}|", row.join("  "));
        }
        println!(" +-----------------------------------------------+");
    }

    fn print_stack(&self, program: &Program) {
        let bp = program.bp();
        for (addr, value) in program.stack().iter().enumerate().rev() {
            let rel = addr as isize - bp as isize;
            cprintln!(" | {:>4} <c>EBP{:+<4}</> : {:<30}|", addr, rel, value.to_string());
        }
        println!(" +-----------------------------------------------+");
    }

    fn print_globals(&self, program: &Program) {
        for (name, entry) in &program.symbols().data {
            if let Some(value) = program.globals().get(entry.offset) {
                cprintln!(" | <g>{:<12}</> : {:<30}|", name, value.to_string());
            }
        }
        println!(" +-----------------------------------------------+");
    }

    fn print_locals(&self, program: &Program) {
        for (name, value) in program.locals() {
            cprintln!(" | <y>{:<12}</> : {:<30}|", name, value.to_string());
        }
        println!(" +-----------------------------------------------+");
    }
}
