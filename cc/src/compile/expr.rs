use arch::{assignable, coerce_value, type_check, Inst, Location, OpCode, Operand, Reg, Type, Value};
use itertools::chain;

use super::{func::FuncCompiler, located};
use crate::{
    ast::{BinaryOp, Expr, UnaryOp},
    error::{CompilerError, Error, ErrorKind},
    link::{lines, Line},
    scope::{Scope, Slot, Symbol},
};

/// Static result type of a binary operator.
pub fn binary_type(op: BinaryOp, left: Type, right: Type) -> Result<Type, ErrorKind> {
    use BinaryOp::*;
    let invalid = |ty| ErrorKind::InvalidOperand {
        op: op.symbol().to_string(),
        ty,
    };
    let scalar = |ty: Type| matches!(ty, Type::Int | Type::Double | Type::Boolean);
    // First operand that fails `accept`
    let check = |accept: &dyn Fn(Type) -> bool| match (accept(left), accept(right)) {
        (true, true) => Ok(()),
        (false, _) => Err(invalid(left)),
        (true, false) => Err(invalid(right)),
    };
    let arithmetic = || {
        if left == Type::Double || right == Type::Double {
            Type::Double
        } else {
            Type::Int
        }
    };

    match op {
        Add if (left == Type::String && right != Type::Void)
            || (right == Type::String && left != Type::Void) =>
        {
            Ok(Type::String)
        }
        Add | Sub | Mul | Div => check(&scalar).map(|_| arithmetic()),
        Mod => check(&|ty: Type| ty.is_integral()).map(|_| Type::Int),
        BitAnd | BitOr | BitXor => {
            check(&|ty: Type| ty.is_integral())?;
            match (left, right) {
                (Type::Boolean, Type::Boolean) => Ok(Type::Boolean),
                _ => Ok(Type::Int),
            }
        }
        Eq | Ne | Lt | Le | Gt | Ge => match (left, right) {
            (Type::String, Type::String) => Ok(Type::Boolean),
            _ => check(&scalar).map(|_| Type::Boolean),
        },
        And | Or => check(&|ty: Type| ty != Type::Void).map(|_| Type::Boolean),
    }
}

/// Static result type of a unary operator.
pub fn unary_type(op: UnaryOp, ty: Type) -> Result<Type, ErrorKind> {
    let invalid = || ErrorKind::InvalidOperand {
        op: op.symbol().to_string(),
        ty,
    };
    match (op, ty) {
        (UnaryOp::Neg, Type::Int | Type::Boolean) => Ok(Type::Int),
        (UnaryOp::Neg, Type::Double) => Ok(Type::Double),
        (UnaryOp::Pos, Type::Int | Type::Double | Type::Boolean) => Ok(ty),
        (UnaryOp::Not, Type::Void) => Err(invalid()),
        (UnaryOp::Not, _) => Ok(Type::Boolean),
        (UnaryOp::Inc | UnaryOp::Dec, Type::Int | Type::Double) => Ok(ty),
        _ => Err(invalid()),
    }
}

/// Outcome of a comparison from the sign `CP` produces.
pub fn compare(op: BinaryOp, ordering: i64) -> bool {
    match op {
        BinaryOp::Eq => ordering == 0,
        BinaryOp::Ne => ordering != 0,
        BinaryOp::Lt => ordering < 0,
        BinaryOp::Le => ordering <= 0,
        BinaryOp::Gt => ordering > 0,
        BinaryOp::Ge => ordering >= 0,
        _ => false,
    }
}

/// Literal checked and converted for a slot of type `ty`.
pub fn literal(ty: Type, value: &Value, loc: Location) -> Result<Value, CompilerError> {
    if !type_check(ty, value) {
        let found = value.type_of();
        return Err(ErrorKind::TypeMismatch { expected: ty, found }.at(loc));
    }
    coerce_value(ty, value).map_err(|e| ErrorKind::from(e).at(loc))
}

fn expect(ty: Type, found: Type, loc: Location) -> Result<(), CompilerError> {
    match assignable(ty, found) {
        true => Ok(()),
        false => Err(ErrorKind::TypeMismatch { expected: ty, found }.at(loc)),
    }
}

/// Push `true` if `R0` is zero, else `false`.
fn is_zero() -> Vec<Line> {
    lines![
        Inst::ldi(Reg::R2, true),
        Inst::rjmp_if_zero(Operand::Imm(Value::Int(2)), Reg::R0),
        Inst::ldi(Reg::R2, false),
        Inst::push(Reg::R2),
    ]
}

/// Push `true` if `R0` is not zero, else `false`.
fn is_nonzero() -> Vec<Line> {
    lines![
        Inst::ldi(Reg::R2, false),
        Inst::rjmp_if_zero(Operand::Imm(Value::Int(2)), Reg::R0),
        Inst::ldi(Reg::R2, true),
        Inst::push(Reg::R2),
    ]
}

impl FuncCompiler<'_> {
    /// Lower `expr` so that its value ends up on top of the stack.
    pub(super) fn expr(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<(Vec<Line>, Type), Error> {
        let (code, ty) = self.lower(expr, scope)?;
        Ok((located(code, expr.loc()), ty))
    }

    fn lower(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<(Vec<Line>, Type), Error> {
        match expr {
            Expr::Literal { value, .. } => Ok((lines![Inst::push(value.clone())], value.type_of())),
            Expr::Identifier { name, loc } => {
                let (src, ty) = self.variable(name, *loc, scope)?;
                Ok((lines![Inst::push(src)], ty))
            }
            Expr::MemberExpression { base, index, .. } => {
                let (code, slot, ty) = self.element(base, index, scope)?;
                let read = lines![Inst::pop(Reg::IX), Inst::push(slot.operand(Some(Reg::IX)))];
                Ok((chain!(code, read).collect(), ty))
            }
            Expr::BinaryExpression {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
                loc,
            } => self.logical(*op, left, right, *loc, scope),
            Expr::BinaryExpression {
                op,
                left,
                right,
                loc,
            } => {
                let (left, lty) = self.expr(left, scope)?;
                let (right, rty) = self.expr(right, scope)?;
                let ty = binary_type(*op, lty, rty).map_err(|kind| kind.at(*loc))?;
                let alu = |op| lines![Inst::binary(op, Reg::R0, Reg::R1), Inst::push(Reg::R0)];
                let apply = match op {
                    BinaryOp::Add => alu(OpCode::ADD),
                    BinaryOp::Sub => alu(OpCode::SUB),
                    BinaryOp::Mul => alu(OpCode::MUL),
                    BinaryOp::Div => alu(OpCode::DIV),
                    BinaryOp::BitAnd => alu(OpCode::AND),
                    BinaryOp::BitOr => alu(OpCode::OR),
                    BinaryOp::BitXor => alu(OpCode::XOR),
                    // a - (a / b) * b
                    BinaryOp::Mod => lines![
                        Inst::mov(Reg::R2, Reg::R0),
                        Inst::binary(OpCode::DIV, Reg::R0, Reg::R1),
                        Inst::binary(OpCode::MUL, Reg::R0, Reg::R1),
                        Inst::binary(OpCode::SUB, Reg::R2, Reg::R0),
                        Inst::push(Reg::R2),
                    ],
                    cmp => {
                        // CP leaves -1, 0 or 1; shift it so the outcome is a zero test
                        let adjust = match cmp {
                            BinaryOp::Lt | BinaryOp::Ge => lines![Inst::unary(OpCode::INC, Reg::R0)],
                            BinaryOp::Gt | BinaryOp::Le => lines![Inst::unary(OpCode::DEC, Reg::R0)],
                            _ => Vec::new(),
                        };
                        let test = match cmp {
                            BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Gt => is_zero(),
                            _ => is_nonzero(),
                        };
                        chain!(lines![Inst::binary(OpCode::CP, Reg::R0, Reg::R1)], adjust, test).collect()
                    }
                };
                let code = chain!(left, right, lines![Inst::pop(Reg::R1), Inst::pop(Reg::R0)], apply);
                Ok((code.collect(), ty))
            }
            Expr::UnaryExpression {
                op: op @ (UnaryOp::Inc | UnaryOp::Dec),
                argument,
                prefix,
                ..
            } => self.step(*op, argument, *prefix, scope, true),
            Expr::UnaryExpression { op, argument, loc, .. } => {
                let (code, ty) = self.expr(argument, scope)?;
                let ty = unary_type(*op, ty).map_err(|kind| kind.at(*loc))?;
                let apply = match op {
                    UnaryOp::Neg => lines![
                        Inst::pop(Reg::R1),
                        Inst::ldi(Reg::R0, 0_i64),
                        Inst::binary(OpCode::SUB, Reg::R0, Reg::R1),
                        Inst::push(Reg::R0),
                    ],
                    UnaryOp::Not => chain!(lines![Inst::pop(Reg::R0)], is_zero()).collect(),
                    _ => Vec::new(),
                };
                Ok((chain!(code, apply).collect(), ty))
            }
            Expr::AssignmentExpression { left, right, .. } => self.assign(left, right, scope, true),
            Expr::CallExpression { callee, args, loc } => self.call(callee, args, *loc, scope, true),
        }
    }

    /// Short-circuit `&&` / `||`, materialised as a boolean in `R2`.
    fn logical(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        loc: Location,
        scope: &Scope<'_>,
    ) -> Result<(Vec<Line>, Type), Error> {
        let (left, lty) = self.expr(left, scope)?;
        let (right, rty) = self.expr(right, scope)?;
        let ty = binary_type(op, lty, rty).map_err(|kind| kind.at(loc))?;
        let yes = self.label("true");
        let no = self.label("false");
        let end = self.label("end");
        let result = lines![
            Line::Label(yes.clone()),
            Inst::ldi(Reg::R2, true),
            Inst::rjmp(Operand::label(&end)),
            Line::Label(no.clone()),
            Inst::ldi(Reg::R2, false),
            Line::Label(end),
            Inst::push(Reg::R2),
        ];
        let code: Vec<Line> = match op {
            BinaryOp::And => chain!(
                left,
                lines![Inst::pop(Reg::R0), Inst::rjmp_if_zero(Operand::label(&no), Reg::R0)],
                right,
                lines![
                    Inst::pop(Reg::R0),
                    Inst::rjmp_if_zero(Operand::label(&no), Reg::R0),
                ],
                result
            )
            .collect(),
            _ => {
                let rhs = self.label("rhs");
                chain!(
                    left,
                    lines![
                        Inst::pop(Reg::R0),
                        Inst::rjmp_if_zero(Operand::label(&rhs), Reg::R0),
                        Inst::rjmp(Operand::label(&yes)),
                        Line::Label(rhs),
                    ],
                    right,
                    lines![
                        Inst::pop(Reg::R0),
                        Inst::rjmp_if_zero(Operand::label(&no), Reg::R0),
                    ],
                    result
                )
                .collect()
            }
        };
        Ok((code, ty))
    }

    /// Operand and type of a scalar variable.
    fn variable(&self, name: &str, loc: Location, scope: &Scope<'_>) -> Result<(Operand, Type), CompilerError> {
        match scope.resolve(name).map_err(|kind| kind.at(loc))? {
            Symbol::Variable { is_array: true, .. } => Err(ErrorKind::ArrayAsValue(name.to_string()).at(loc)),
            Symbol::Variable { ty, slot, .. } => Ok((slot.operand(None), *ty)),
            Symbol::Function { .. } => Err(ErrorKind::NotAVariable(name.to_string()).at(loc)),
        }
    }

    /// Code pushing the element index, plus the array's slot and element type.
    fn element(&mut self, base: &Expr, index: &Expr, scope: &Scope<'_>) -> Result<(Vec<Line>, Slot, Type), Error> {
        let Expr::Identifier { name, loc } = base else {
            return Err(ErrorKind::NotAnArray("expression".to_string()).at(base.loc()).into());
        };
        let (slot, ty) = match scope.resolve(name).map_err(|kind| kind.at(*loc))? {
            Symbol::Variable {
                is_array: true,
                ty,
                slot,
                ..
            } => (slot.clone(), *ty),
            Symbol::Variable { .. } => return Err(ErrorKind::NotAnArray(name.clone()).at(*loc).into()),
            Symbol::Function { .. } => return Err(ErrorKind::NotAVariable(name.clone()).at(*loc).into()),
        };
        let (code, ity) = self.expr(index, scope)?;
        if !ity.is_integral() {
            return Err(ErrorKind::InvalidOperand {
                op: "[]".to_string(),
                ty: ity,
            }
            .at(index.loc())
            .into());
        }
        Ok((code, slot, ty))
    }

    /// Push a value for a slot of type `ty`. Literals are converted now.
    pub(super) fn value(&mut self, expr: &Expr, ty: Type, scope: &Scope<'_>) -> Result<Vec<Line>, Error> {
        match expr {
            Expr::Literal { value, loc } => Ok(located(lines![Inst::push(literal(ty, value, *loc)?)], *loc)),
            other => {
                let (code, found) = self.expr(other, scope)?;
                expect(ty, found, other.loc())?;
                Ok(chain!(code, self.convert(found, ty)).collect())
            }
        }
    }

    /// Convert the value on top of the stack from `from` to `to`.
    fn convert(&mut self, from: Type, to: Type) -> Vec<Line> {
        if from == to {
            return Vec::new();
        }
        let cell = Slot::Global(self.data.cast_cell(to)).operand(None);
        lines![
            Inst::pop(Reg::R0),
            Inst::mov(cell.clone(), Reg::R0).with_comment(format!("{} -> {}", from, to)),
            Inst::push(cell),
        ]
    }

    /// Store `rhs` into `dest`, a slot of type `ty`.
    pub(super) fn store(&mut self, dest: Operand, ty: Type, rhs: &Expr, scope: &Scope<'_>) -> Result<Vec<Line>, Error> {
        match rhs {
            Expr::Literal { value, loc } => Ok(lines![Inst::mov(dest, literal(ty, value, *loc)?)]),
            Expr::Identifier { name, loc } => {
                let (src, found) = self.variable(name, *loc, scope)?;
                expect(ty, found, *loc)?;
                Ok(lines![Inst::mov(dest, src)])
            }
            other => {
                let (code, found) = self.expr(other, scope)?;
                expect(ty, found, other.loc())?;
                Ok(chain!(code, lines![Inst::pop(Reg::R0), Inst::mov(dest, Reg::R0)]).collect())
            }
        }
    }

    /// `left = right`. With `want_value` the stored value is pushed afterwards.
    pub(super) fn assign(
        &mut self,
        left: &Expr,
        right: &Expr,
        scope: &Scope<'_>,
        want_value: bool,
    ) -> Result<(Vec<Line>, Type), Error> {
        let (code, dest, ty) = match left {
            Expr::Identifier { name, loc } => {
                let (dest, ty) = self.variable(name, *loc, scope)?;
                (self.store(dest.clone(), ty, right, scope)?, dest, ty)
            }
            // Only named arrays are addressable, so `a[i][j]` falls through
            Expr::MemberExpression { base, index, .. } if matches!(**base, Expr::Identifier { .. }) => {
                // The index waits on the stack while the right side is evaluated
                let (index, slot, ty) = self.element(base, index, scope)?;
                let dest = slot.operand(Some(Reg::IX));
                let code: Vec<Line> = match right {
                    Expr::Literal { .. } | Expr::Identifier { .. } => {
                        let store = self.store(dest.clone(), ty, right, scope)?;
                        chain!(index, lines![Inst::pop(Reg::IX)], store).collect()
                    }
                    other => {
                        let (value, found) = self.expr(other, scope)?;
                        expect(ty, found, other.loc())?;
                        chain!(
                            index,
                            value,
                            lines![
                                Inst::pop(Reg::R0),
                                Inst::pop(Reg::IX),
                                Inst::mov(dest.clone(), Reg::R0),
                            ]
                        )
                        .collect()
                    }
                };
                (code, dest, ty)
            }
            other => return Err(ErrorKind::IllegalAssignmentTarget.at(other.loc()).into()),
        };
        match want_value {
            true => Ok((chain!(code, lines![Inst::push(dest)]).collect(), ty)),
            false => Ok((code, ty)),
        }
    }

    /// `++` / `--` on a variable or array element.
    pub(super) fn step(
        &mut self,
        op: UnaryOp,
        argument: &Expr,
        prefix: bool,
        scope: &Scope<'_>,
        want_value: bool,
    ) -> Result<(Vec<Line>, Type), Error> {
        let (address, dest, ty) = match argument {
            Expr::Identifier { name, loc } => {
                let (dest, ty) = self.variable(name, *loc, scope)?;
                (Vec::new(), dest, ty)
            }
            Expr::MemberExpression { base, index, .. } if matches!(**base, Expr::Identifier { .. }) => {
                let (index, slot, ty) = self.element(base, index, scope)?;
                let address: Vec<Line> = chain!(index, lines![Inst::pop(Reg::IX)]).collect();
                (address, slot.operand(Some(Reg::IX)), ty)
            }
            other => return Err(ErrorKind::IllegalAssignmentTarget.at(other.loc()).into()),
        };
        let ty = unary_type(op, ty).map_err(|kind| kind.at(argument.loc()))?;
        let opcode = match op {
            UnaryOp::Inc => OpCode::INC,
            _ => OpCode::DEC,
        };
        let change = Inst::unary(opcode, dest.clone());
        let apply = match (want_value, prefix) {
            (false, _) => lines![change],
            (true, true) => lines![change, Inst::push(dest)],
            (true, false) => lines![Inst::push(dest.clone()), change],
        };
        Ok((chain!(address, apply).collect(), ty))
    }

    /// Call a compiled or host function. Arguments are pushed last to first.
    pub(super) fn call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        loc: Location,
        scope: &Scope<'_>,
        want_value: bool,
    ) -> Result<(Vec<Line>, Type), Error> {
        let Expr::Identifier { name, loc: at } = callee else {
            return Err(ErrorKind::NotCallable.at(callee.loc()).into());
        };
        let (params, ret, external, variadic) = match scope.resolve(name).map_err(|kind| kind.at(*at))? {
            Symbol::Function {
                params,
                ret,
                external,
                variadic,
            } => (params.clone(), *ret, *external, *variadic),
            Symbol::Variable { .. } => return Err(ErrorKind::NotAFunction(name.clone()).at(*at).into()),
        };
        if args.len() < params.len() || (!variadic && args.len() > params.len()) {
            return Err(ErrorKind::ArgumentCount {
                name: name.clone(),
                expected: params.len(),
                found: args.len(),
            }
            .at(loc)
            .into());
        }
        if want_value && ret == Type::Void {
            return Err(ErrorKind::VoidValue(name.clone()).at(loc).into());
        }

        let mut code = Vec::new();
        for (k, arg) in args.iter().enumerate().rev() {
            match params.get(k) {
                Some(ty) => code.extend(self.value(arg, *ty, scope)?),
                None => code.extend(self.expr(arg, scope)?.0),
            }
        }
        let target = match external {
            true => Operand::Extern(name.clone()),
            false => Operand::label(name),
        };
        code.push(Inst::call(target, args.len()).with_comment(name.clone()).into());
        match (want_value, external) {
            (false, _) => {}
            (true, false) => code.push(Inst::push(Reg::RV).into()),
            (true, true) => {
                // Host results pass through the typed store as the declared return type
                let cell = Slot::Global(self.data.cast_cell(ret)).operand(None);
                code.extend(lines![
                    Inst::mov(cell.clone(), Reg::RV).with_comment(format!("{} -> {}", name, ret)),
                    Inst::push(cell),
                ]);
            }
        }
        Ok((code, ret))
    }
}
