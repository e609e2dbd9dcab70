use arch::{Inst, OpCode, Operand, Value};
use std::collections::HashMap;

use crate::error::InternalError;

/// A line of generated code before layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Instruction, possibly with `Label` operands
    Inst(Inst),
    /// Names the address of the next instruction
    Label(String),
}

impl From<Inst> for Line {
    fn from(inst: Inst) -> Self {
        Line::Inst(inst)
    }
}

/// `vec![...]` of [`Line`]s from instructions and labels.
macro_rules! lines {
    ($($line:expr),* $(,)?) => {
        vec![$($crate::link::Line::from($line)),*]
    };
}
pub(crate) use lines;

/// Label addresses: each label names the next instruction.
pub fn layout(lines: &[Line]) -> Result<HashMap<String, usize>, InternalError> {
    let mut labels = HashMap::new();
    let mut addr = 0;
    for line in lines {
        match line {
            Line::Inst(_) => addr += 1,
            Line::Label(name) => {
                if labels.insert(name.clone(), addr).is_some() {
                    return Err(InternalError::LabelRedefinition(name.clone()));
                }
            }
        }
    }
    Ok(labels)
}

/// Second pass: drop label lines and rewrite label operands.
///
/// `RJMP` targets become offsets relative to the jump itself, every other
/// label operand becomes an absolute address.
pub fn assemble(lines: Vec<Line>) -> Result<Vec<Inst>, InternalError> {
    let labels = layout(&lines)?;
    let mut insts = Vec::new();
    for line in lines {
        let Line::Inst(mut inst) = line else {
            continue;
        };
        let pc = insts.len() as i64;
        let relative = inst.op == OpCode::RJMP;
        for operand in inst.operands_mut() {
            if let Operand::Label(name) = operand {
                let addr = *labels
                    .get(name.as_str())
                    .ok_or_else(|| InternalError::UndefinedLabel(name.clone()))?
                    as i64;
                let target = if relative { addr - pc } else { addr };
                *operand = Operand::Imm(Value::Int(target));
            }
        }
        insts.push(inst);
    }
    Ok(insts)
}

/// After assembly no operand may still be pending.
pub fn check_resolved(insts: &[Inst]) -> Result<(), InternalError> {
    match insts
        .iter()
        .enumerate()
        .find(|(_, inst)| inst.operands().any(Operand::is_pending))
    {
        Some((addr, inst)) => Err(InternalError::PendingOperand(addr, inst.to_string())),
        None => Ok(()),
    }
}
