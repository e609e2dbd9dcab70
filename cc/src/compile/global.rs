use arch::{
    alu::alu, coerce_value, type_check, OpCode, Type, Value,
};
use emu::DataEntry;
use indexmap::IndexMap;
use std::iter;

use super::{
    array_length,
    expr::{binary_type, compare, unary_type},
};
use crate::{
    ast::{self, BinaryOp, Expr, UnaryOp},
    error::{CompilerError, ErrorKind},
    scope::{Scope, Slot, Symbol},
};

/// Global region being laid out, in declaration order.
#[derive(Debug, Default)]
pub struct Data {
    values: Vec<Value>,
    entries: IndexMap<String, DataEntry>,
    casts: IndexMap<Type, usize>,
}

impl Data {
    /// Scratch slot of type `ty`. Storing into it converts through the typed store.
    pub fn cast_cell(&mut self, ty: Type) -> usize {
        if let Some(offset) = self.casts.get(&ty) {
            return *offset;
        }
        let offset = self.values.len();
        self.values.push(Value::default_of(ty));
        self.entries.insert(
            format!("cast:{}", ty),
            DataEntry {
                offset,
                ty,
                length: None,
            },
        );
        self.casts.insert(ty, offset);
        offset
    }

    pub fn declare(
        &mut self,
        decl: &ast::VariableDeclaration,
        scope: &mut Scope<'_>,
    ) -> Result<(), CompilerError> {
        let ty = decl.ty;
        if ty == Type::Void {
            return Err(ErrorKind::VoidVariable.at(decl.loc));
        }
        for d in &decl.declarators {
            let offset = self.values.len();
            let (length, value) = if decl.is_array {
                (Some(array_length(d)?), None)
            } else {
                let value = match &d.initializer {
                    Some(init) => {
                        let value = eval(init, scope)?;
                        if !type_check(ty, &value) {
                            let found = value.type_of();
                            return Err(ErrorKind::TypeMismatch { expected: ty, found }.at(init.loc()));
                        }
                        coerce_value(ty, &value).map_err(|e| ErrorKind::from(e).at(init.loc()))?
                    }
                    None => Value::default_of(ty),
                };
                (None, Some(value))
            };

            let symbol = Symbol::Variable {
                ty,
                is_array: decl.is_array,
                length,
                value: value.clone(),
                slot: Slot::Global(offset),
            };
            scope.declare(&d.name, symbol).map_err(|kind| kind.at(d.loc))?;

            match value {
                Some(value) => self.values.push(value),
                None => self
                    .values
                    .extend(iter::repeat(Value::default_of(ty)).take(length.unwrap_or(1))),
            }
            self.entries
                .insert(d.name.clone(), DataEntry { offset, ty, length });
        }
        Ok(())
    }

    pub fn finish(self) -> (Vec<Value>, IndexMap<String, DataEntry>) {
        (self.values, self.entries)
    }
}

/// Compile-time value of a global initializer.
pub fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Value, CompilerError> {
    let loc = expr.loc();
    match expr {
        Expr::Literal { value, .. } => Ok(value.clone()),
        Expr::Identifier { name, .. } => match scope.resolve(name).map_err(|kind| kind.at(loc))? {
            Symbol::Variable { is_array: true, .. } => Err(ErrorKind::ArrayAsValue(name.clone()).at(loc)),
            Symbol::Variable {
                value: Some(value), ..
            } => Ok(value.clone()),
            Symbol::Variable { .. } => Err(ErrorKind::NonConstantInitializer.at(loc)),
            Symbol::Function { .. } => Err(ErrorKind::NotAVariable(name.clone()).at(loc)),
        },
        Expr::CallExpression { .. } => Err(ErrorKind::CallInGlobalInitializer.at(loc)),
        Expr::BinaryExpression {
            op, left, right, ..
        } => {
            let a = eval(left, scope)?;
            let b = eval(right, scope)?;
            binary_type(*op, a.type_of(), b.type_of()).map_err(|kind| kind.at(loc))?;
            fold(*op, &a, &b).map_err(|kind| kind.at(loc))
        }
        Expr::UnaryExpression { op, argument, .. } => {
            let a = eval(argument, scope)?;
            unary_type(*op, a.type_of()).map_err(|kind| kind.at(loc))?;
            match op {
                UnaryOp::Neg => Ok(alu(OpCode::SUB, &Value::Int(0), &a).map_err(|e| ErrorKind::from(e).at(loc))?),
                UnaryOp::Pos => Ok(a),
                UnaryOp::Not => Ok(Value::Bool(a.is_zero())),
                UnaryOp::Inc | UnaryOp::Dec => Err(ErrorKind::NonConstantInitializer.at(loc)),
            }
        }
        Expr::AssignmentExpression { .. } | Expr::MemberExpression { .. } => {
            Err(ErrorKind::NonConstantInitializer.at(loc))
        }
    }
}

/// Same results as the instruction sequences the operators lower to.
fn fold(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ErrorKind> {
    use BinaryOp::*;
    let value = match op {
        Add => alu(OpCode::ADD, a, b)?,
        Sub => alu(OpCode::SUB, a, b)?,
        Mul => alu(OpCode::MUL, a, b)?,
        Div => alu(OpCode::DIV, a, b)?,
        Mod => {
            let quotient = alu(OpCode::DIV, a, b)?;
            alu(OpCode::SUB, a, &alu(OpCode::MUL, &quotient, b)?)?
        }
        BitAnd => alu(OpCode::AND, a, b)?,
        BitOr => alu(OpCode::OR, a, b)?,
        BitXor => alu(OpCode::XOR, a, b)?,
        Eq | Ne | Lt | Le | Gt | Ge => {
            let ordering = alu(OpCode::CP, a, b)?.as_int().unwrap_or_default();
            Value::Bool(compare(op, ordering))
        }
        And => Value::Bool(!a.is_zero() && !b.is_zero()),
        Or => Value::Bool(!a.is_zero() || !b.is_zero()),
    };
    Ok(value)
}
