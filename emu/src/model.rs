use arch::{
    alu::{alu, step},
    coerce_value, Base, Inst, OpCode, Operand, Ptr, Reg, Value,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{error::RuntimeError, hooks::Hook, image::Image, symbols::SymbolMap};

/// Host function callable from compiled code with `CALL <name>, argc`.
pub type HostFn = Box<dyn FnMut(&[Value]) -> Value>;

/// Call stack record pushed by `CALL` and consumed by `RET`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub return_pc: usize,
    pub bp: usize,
    pub argc: usize,
}

enum Slot {
    Stack(usize),
    Global(usize),
}

enum Flow {
    Next,
    Jump(usize),
}

/// Compiled program together with its machine state.
///
/// The program only moves when the host calls [`Program::execute_next`].
pub struct Program {
    insts: Vec<Inst>,
    pc: usize,
    bp: usize,
    regs: Vec<Value>,
    stack: Vec<Value>,
    globals: Vec<Value>,
    frames: Vec<Frame>,
    externs: IndexMap<String, HostFn>,
    symbols: SymbolMap,
    hooks: Vec<Box<dyn Hook>>,
    steps: u64,
}

impl Program {
    pub fn new(insts: Vec<Inst>, globals: Vec<Value>, symbols: SymbolMap) -> Self {
        Program {
            insts,
            pc: 0,
            bp: 0,
            regs: Reg::iter().map(|_| Value::default()).collect(),
            stack: Vec::new(),
            globals,
            frames: Vec::new(),
            externs: IndexMap::new(),
            symbols,
            hooks: Vec::new(),
            steps: 0,
        }
    }

    pub fn register_external_function<F>(&mut self, name: &str, f: F)
    where
        F: FnMut(&[Value]) -> Value + 'static,
    {
        self.externs.insert(name.to_string(), Box::new(f));
    }

    pub fn attach(&mut self, mut hook: Box<dyn Hook>) {
        hook.init(self);
        self.hooks.push(hook);
    }
}

impl From<Image> for Program {
    fn from(image: Image) -> Self {
        Program::new(image.instructions, image.globals, image.symbols)
    }
}

// Inspection
impl Program {
    pub fn has_next_statement(&self) -> bool {
        self.pc < self.insts.len()
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.stack.len()
    }

    pub fn bp(&self) -> usize {
        self.bp
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn register(&self, reg: Reg) -> &Value {
        &self.regs[reg.index()]
    }

    pub fn registers(&self) -> IndexMap<String, Value> {
        Reg::iter()
            .map(|reg| (reg.to_string(), self.regs[reg.index()].clone()))
            .collect()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    pub fn instructions(&self) -> &[Inst] {
        &self.insts
    }

    pub fn call_stack(&self) -> &[Frame] {
        &self.frames
    }

    pub fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.externs.contains_key(name)
    }

    pub fn function_at(&self, pc: usize) -> Option<&str> {
        self.symbols.function_at(pc).map(|(name, _)| name)
    }

    /// Live parameters and locals of the function the PC is in.
    /// Array elements are listed as `name[i]`.
    pub fn locals(&self) -> IndexMap<String, Value> {
        let mut locals = IndexMap::new();
        let Some((_, entry)) = self.symbols.function_at(self.pc) else {
            return locals;
        };
        for (name, slot) in &entry.frame {
            let read = |k: isize| {
                let addr = self.bp as isize + slot.offset + k;
                usize::try_from(addr)
                    .ok()
                    .and_then(|addr| self.stack.get(addr))
                    .cloned()
            };
            match slot.length {
                None => {
                    if let Some(value) = read(0) {
                        locals.insert(name.clone(), value);
                    }
                }
                Some(len) => {
                    for k in 0..len {
                        if let Some(value) = read(k as isize) {
                            locals.insert(format!("{}[{}]", name, k), value);
                        }
                    }
                }
            }
        }
        locals
    }

    /// Global variable by name.
    pub fn global(&self, name: &str) -> Option<&Value> {
        let entry = self.symbols.data.get(name)?;
        self.globals.get(entry.offset)
    }
}

// Execution
impl Program {
    /// Execute the instruction at the PC.
    ///
    /// On error the failing instruction has no effect and the PC stays on it.
    pub fn execute_next(&mut self) -> Result<(), RuntimeError> {
        let pc = self.pc;
        let inst = self
            .insts
            .get(pc)
            .cloned()
            .ok_or(RuntimeError::Halted(pc))?;
        if !inst.is_well_formed() {
            return Err(malformed(&inst, "operand count"));
        }

        self.pc = match self.exec(pc, &inst)? {
            Flow::Next => pc + 1,
            Flow::Jump(target) => target,
        };
        self.steps += 1;

        let mut hooks = std::mem::take(&mut self.hooks);
        for hook in hooks.iter_mut() {
            hook.exec(self.steps, pc, &inst, self);
        }
        self.hooks = hooks;
        Ok(())
    }

    fn exec(&mut self, pc: usize, inst: &Inst) -> Result<Flow, RuntimeError> {
        use OpCode::*;
        let dest = inst.dest.as_ref();
        let src = inst.src.as_ref();
        let first = || dest.ok_or_else(|| malformed(inst, "missing operand"));
        let second = || src.ok_or_else(|| malformed(inst, "missing operand"));

        match inst.op {
            ADD | SUB | MUL | DIV | AND | OR | XOR | CP => {
                let a = self.read(first()?)?;
                let b = self.read(second()?)?;
                let value = alu(inst.op, &a, &b)?;
                self.write(first()?, value)?;
                Ok(Flow::Next)
            }
            INC | DEC => {
                let value = step(inst.op, &self.read(first()?)?)?;
                self.write(first()?, value)?;
                Ok(Flow::Next)
            }
            MOV => {
                let value = self.read(second()?)?;
                self.write(first()?, value)?;
                Ok(Flow::Next)
            }
            LDI => match (first()?, second()?) {
                (Operand::Reg(reg), Operand::Imm(value)) => {
                    self.regs[reg.index()] = value.clone();
                    Ok(Flow::Next)
                }
                _ => Err(malformed(inst, "LDI takes a register and an immediate")),
            },
            PUSH => {
                let value = self.read(first()?)?;
                self.stack.push(value);
                Ok(Flow::Next)
            }
            POP => {
                let value = self.stack.pop().ok_or(RuntimeError::StackUnderflow)?;
                if let Err(err) = self.write(first()?, value.clone()) {
                    self.stack.push(value);
                    return Err(err);
                }
                Ok(Flow::Next)
            }
            JMP | RJMP => {
                if let Some(cond) = src {
                    if !self.read(cond)?.is_zero() {
                        return Ok(Flow::Next);
                    }
                }
                let target = self.int(first()?, inst)?;
                let target = match inst.op {
                    JMP => target,
                    _ => pc as i64 + target,
                };
                usize::try_from(target)
                    .map(Flow::Jump)
                    .map_err(|_| RuntimeError::InvalidJump(target))
            }
            CALL => {
                let argc = self.int(second()?, inst)?;
                let argc = usize::try_from(argc)
                    .map_err(|_| malformed(inst, "negative argument count"))?;
                if self.stack.len() < argc {
                    return Err(RuntimeError::StackUnderflow);
                }
                match first()? {
                    Operand::Extern(name) => {
                        let Some(host) = self.externs.get_mut(name) else {
                            return Err(RuntimeError::UnregisteredExternal(name.clone()));
                        };
                        // First argument is on top
                        let mut args = self.stack.split_off(self.stack.len() - argc);
                        args.reverse();
                        self.regs[Reg::RV.index()] = host(&args);
                        Ok(Flow::Next)
                    }
                    target => {
                        let target = self.int(target, inst)?;
                        let target =
                            usize::try_from(target).map_err(|_| RuntimeError::InvalidJump(target))?;
                        self.frames.push(Frame {
                            return_pc: pc + 1,
                            bp: self.bp,
                            argc,
                        });
                        self.stack.push(Value::Int(pc as i64 + 1));
                        self.bp = self.stack.len() - 1;
                        Ok(Flow::Jump(target))
                    }
                }
            }
            RET => {
                let frame = self.frames.last().cloned().ok_or(RuntimeError::NoCallFrame)?;
                let keep = self
                    .bp
                    .checked_sub(frame.argc)
                    .ok_or_else(|| malformed(inst, "frame below its arguments"))?;
                self.frames.pop();
                self.stack.truncate(keep);
                self.bp = frame.bp;
                Ok(Flow::Jump(frame.return_pc))
            }
            NOP => Ok(Flow::Next),
        }
    }

    fn int(&self, operand: &Operand, inst: &Inst) -> Result<i64, RuntimeError> {
        self.read(operand)?
            .as_int()
            .ok_or_else(|| malformed(inst, "expected an integer operand"))
    }

    fn address(&self, ptr: &Ptr) -> Result<Slot, RuntimeError> {
        let index = match ptr.index {
            Some(reg) => {
                let value = &self.regs[reg.index()];
                value
                    .as_int()
                    .ok_or_else(|| RuntimeError::InvalidIndex(value.to_string()))?
            }
            None => 0,
        };
        let (base, len) = match ptr.base {
            Base::EBP => (self.bp as i64, self.stack.len()),
            Base::GBP => (0, self.globals.len()),
        };
        let Some(addr) = base.checked_add(ptr.offset as i64).and_then(|a| a.checked_add(index)) else {
            return Err(RuntimeError::OutOfBounds(ptr.to_string(), index));
        };
        match usize::try_from(addr) {
            Ok(addr) if addr < len => Ok(match ptr.base {
                Base::EBP => Slot::Stack(addr),
                Base::GBP => Slot::Global(addr),
            }),
            _ => Err(RuntimeError::OutOfBounds(ptr.to_string(), addr)),
        }
    }

    fn read(&self, operand: &Operand) -> Result<Value, RuntimeError> {
        match operand {
            Operand::Imm(value) => Ok(value.clone()),
            Operand::Reg(reg) => Ok(self.regs[reg.index()].clone()),
            Operand::Ptr(ptr) => Ok(match self.address(ptr)? {
                Slot::Stack(addr) => self.stack[addr].clone(),
                Slot::Global(addr) => self.globals[addr].clone(),
            }),
            other => Err(RuntimeError::Malformed(
                other.to_string(),
                "operand cannot be read".to_string(),
            )),
        }
    }

    /// Stores into memory keep the type of the slot.
    fn write(&mut self, operand: &Operand, value: Value) -> Result<(), RuntimeError> {
        match operand {
            Operand::Reg(reg) => {
                self.regs[reg.index()] = value;
                Ok(())
            }
            Operand::Ptr(ptr) => {
                let cell = match self.address(ptr)? {
                    Slot::Stack(addr) => &mut self.stack[addr],
                    Slot::Global(addr) => &mut self.globals[addr],
                };
                *cell = coerce_value(cell.type_of(), &value)?;
                Ok(())
            }
            other => Err(RuntimeError::Malformed(
                other.to_string(),
                "operand cannot be written".to_string(),
            )),
        }
    }
}

fn malformed(inst: &Inst, reason: &str) -> RuntimeError {
    RuntimeError::Malformed(inst.to_string(), reason.to_string())
}
