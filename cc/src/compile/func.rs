use arch::{Inst, Operand, Reg, Type, Value};
use itertools::chain;

use super::{array_length, frame::Frame, global::Data, located};
use crate::{
    ast::{self, Expr, Stmt},
    error::{Error, ErrorKind},
    link::{lines, Line},
    scope::{Scope, Slot, Symbol},
};

/// Generated code of one function, pending variables already resolved.
pub struct Compiled {
    pub name: String,
    pub ret: Type,
    pub lines: Vec<Line>,
    pub frame: Frame,
}

struct Loop {
    next: String,
    exit: String,
}

pub struct FuncCompiler<'d> {
    pub(super) name: String,
    ret: Type,
    pub(super) frame: Frame,
    /// Slot reservations for declarations nested below the current body statement
    reserved: Vec<Line>,
    depth: usize,
    loops: Vec<Loop>,
    labels: usize,
    pub(super) data: &'d mut Data,
}

impl<'d> FuncCompiler<'d> {
    pub fn compile(
        func: &ast::FunctionDeclaration,
        global: &Scope<'_>,
        data: &'d mut Data,
    ) -> Result<Compiled, Error> {
        let mut this = FuncCompiler {
            name: func.name.clone(),
            ret: func.return_type,
            frame: Frame::new(),
            reserved: Vec::new(),
            depth: 0,
            loops: Vec::new(),
            labels: 0,
            data,
        };

        let mut scope = global.child();
        for decl in &func.parameters {
            for d in &decl.declarators {
                let key = this.frame.param(&d.name, decl.ty);
                let symbol = Symbol::Variable {
                    ty: decl.ty,
                    is_array: false,
                    length: None,
                    value: None,
                    slot: Slot::Frame(key),
                };
                scope.declare(&d.name, symbol).map_err(|kind| kind.at(d.loc))?;
            }
        }

        let mut code = lines![Line::Label(func.name.clone())];
        for stmt in &func.body {
            let body = this.stmt(stmt, &mut scope)?;
            code.extend(std::mem::take(&mut this.reserved));
            code.extend(body);
        }
        code.push(Inst::ret().at(func.loc).into());

        // Resolution pass
        for line in code.iter_mut() {
            if let Line::Inst(inst) = line {
                for operand in inst.operands_mut() {
                    this.frame.resolve(&this.name, operand)?;
                }
            }
        }

        Ok(Compiled {
            name: this.name,
            ret: this.ret,
            lines: code,
            frame: this.frame,
        })
    }

    pub(super) fn label(&mut self, kind: &str) -> String {
        self.labels += 1;
        format!("{}.{}{}", self.name, kind, self.labels)
    }

    fn stmt(&mut self, stmt: &Stmt, scope: &mut Scope<'_>) -> Result<Vec<Line>, Error> {
        let code = match stmt {
            Stmt::FunctionDeclaration(_) => {
                return Err(ErrorKind::IllegalStatement("A function declaration")
                    .at(stmt.loc())
                    .into())
            }
            Stmt::VariableDeclaration(decl) => self.declare(decl, scope)?,
            Stmt::Block { body, .. } => {
                let mut inner = scope.child();
                self.depth += 1;
                let code = body
                    .iter()
                    .map(|stmt| self.stmt(stmt, &mut inner))
                    .collect::<Result<Vec<_>, _>>();
                self.depth -= 1;
                code?.concat()
            }
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.condition(test, scope)?;
                let then = self.nested(consequent, scope)?;
                let end = self.label("endif");
                match alternate {
                    Some(alternate) => {
                        let otherwise = self.nested(alternate, scope)?;
                        let other = self.label("else");
                        chain!(
                            test,
                            lines![Inst::rjmp_if_zero(Operand::label(&other), Reg::R0)],
                            then,
                            lines![Inst::rjmp(Operand::label(&end)), Line::Label(other)],
                            otherwise,
                            lines![Line::Label(end)]
                        )
                        .collect()
                    }
                    None => chain!(
                        test,
                        lines![Inst::rjmp_if_zero(Operand::label(&end), Reg::R0)],
                        then,
                        lines![Line::Label(end)]
                    )
                    .collect(),
                }
            }
            Stmt::While { test, body, .. } => {
                let top = self.label("while");
                let exit = self.label("endwhile");
                let test = self.condition(test, scope)?;
                let body = self.looped(&top, &exit, body, scope)?;
                chain!(
                    lines![Line::Label(top.clone())],
                    test,
                    lines![Inst::rjmp_if_zero(Operand::label(&exit), Reg::R0)],
                    body,
                    lines![Inst::rjmp(Operand::label(&top)), Line::Label(exit)]
                )
                .collect()
            }
            Stmt::DoWhile { body, test, .. } => {
                let top = self.label("do");
                let next = self.label("test");
                let exit = self.label("enddo");
                let body = self.looped(&next, &exit, body, scope)?;
                let test = self.condition(test, scope)?;
                chain!(
                    lines![Line::Label(top.clone())],
                    body,
                    lines![Line::Label(next)],
                    test,
                    lines![
                        Inst::rjmp_if_zero(Operand::label(&exit), Reg::R0),
                        Inst::rjmp(Operand::label(&top)),
                        Line::Label(exit),
                    ]
                )
                .collect()
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                let mut inner = scope.child();
                self.depth += 1;
                let code = self.for_loop(init.as_deref(), test.as_ref(), update.as_ref(), body, &mut inner);
                self.depth -= 1;
                code?
            }
            Stmt::Return { argument, loc } => match (argument, self.ret) {
                (None, Type::Void) => lines![Inst::ret()],
                (None, _) => return Err(ErrorKind::MissingReturnValue(self.name.clone()).at(*loc).into()),
                (Some(_), Type::Void) => {
                    return Err(ErrorKind::UnexpectedReturnValue(self.name.clone())
                        .at(*loc)
                        .into())
                }
                (Some(argument), ret) => chain!(
                    self.value(argument, ret, scope)?,
                    lines![Inst::pop(Reg::RV), Inst::ret()]
                )
                .collect(),
            },
            Stmt::Break { loc } => match self.loops.last() {
                Some(l) => lines![Inst::rjmp(Operand::label(&l.exit))],
                None => return Err(ErrorKind::BreakOutsideLoop.at(*loc).into()),
            },
            Stmt::Continue { loc } => match self.loops.last() {
                Some(l) => lines![Inst::rjmp(Operand::label(&l.next))],
                None => return Err(ErrorKind::ContinueOutsideLoop.at(*loc).into()),
            },
            Stmt::ExpressionStatement { expression, .. } => self.effect(expression, scope)?,
        };
        Ok(located(code, stmt.loc()))
    }

    /// Statement below the current one, in its own scope.
    fn nested(&mut self, stmt: &Stmt, scope: &Scope<'_>) -> Result<Vec<Line>, Error> {
        let mut inner = scope.child();
        self.depth += 1;
        let code = self.stmt(stmt, &mut inner);
        self.depth -= 1;
        code
    }

    fn looped(&mut self, next: &str, exit: &str, body: &Stmt, scope: &Scope<'_>) -> Result<Vec<Line>, Error> {
        self.loops.push(Loop {
            next: next.to_string(),
            exit: exit.to_string(),
        });
        let code = self.nested(body, scope);
        self.loops.pop();
        code
    }

    fn for_loop(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<Line>, Error> {
        let init = match init {
            Some(init) => self.stmt(init, scope)?,
            None => Vec::new(),
        };
        let top = self.label("for");
        let next = self.label("next");
        let exit = self.label("endfor");
        let test: Vec<Line> = match test {
            Some(test) => chain!(
                self.condition(test, scope)?,
                lines![Inst::rjmp_if_zero(Operand::label(&exit), Reg::R0)]
            )
            .collect(),
            None => Vec::new(),
        };
        let body = self.looped(&next, &exit, body, scope)?;
        let update = match update {
            Some(update) => located(self.effect(update, scope)?, update.loc()),
            None => Vec::new(),
        };
        Ok(chain!(
            init,
            lines![Line::Label(top.clone())],
            test,
            body,
            lines![Line::Label(next)],
            update,
            lines![Inst::rjmp(Operand::label(&top)), Line::Label(exit)]
        )
        .collect())
    }

    /// Evaluate a branch condition into `R0`.
    fn condition(&mut self, test: &Expr, scope: &Scope<'_>) -> Result<Vec<Line>, Error> {
        let (code, _) = self.expr(test, scope)?;
        Ok(chain!(code, lines![Inst::pop(Reg::R0)]).collect())
    }

    /// Expression evaluated for its side effects only.
    fn effect(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<Vec<Line>, Error> {
        match expr {
            Expr::AssignmentExpression { left, right, .. } => Ok(self.assign(left, right, scope, false)?.0),
            Expr::CallExpression { callee, args, loc } => Ok(self.call(callee, args, *loc, scope, false)?.0),
            Expr::UnaryExpression {
                op: op @ (ast::UnaryOp::Inc | ast::UnaryOp::Dec),
                argument,
                prefix,
                ..
            } => Ok(self.step(*op, argument, *prefix, scope, false)?.0),
            other => {
                let (code, _) = self.expr(other, scope)?;
                Ok(chain!(code, lines![Inst::pop(Reg::R0)]).collect())
            }
        }
    }

    fn declare(&mut self, decl: &ast::VariableDeclaration, scope: &mut Scope<'_>) -> Result<Vec<Line>, Error> {
        let ty = decl.ty;
        if ty == Type::Void {
            return Err(ErrorKind::VoidVariable.at(decl.loc).into());
        }
        let mut code = Vec::new();
        for d in &decl.declarators {
            let comment = format!("{} {}", ty, d.name);

            if decl.is_array {
                let length = array_length(d)?;
                let (key, _) = self.frame.local(&d.name, ty, Some(length));
                let symbol = Symbol::Variable {
                    ty,
                    is_array: true,
                    length: Some(length),
                    value: None,
                    slot: Slot::Frame(key),
                };
                scope.declare(&d.name, symbol).map_err(|kind| kind.at(d.loc))?;
                let slots = (0..length).map(|k| {
                    Line::from(
                        Inst::push(Value::default_of(ty))
                            .with_comment(format!("{}[{}]", comment, k))
                            .at(d.loc),
                    )
                });
                match self.depth {
                    0 => code.extend(slots),
                    _ => self.reserved.extend(slots),
                }
                continue;
            }

            // Literals are coerced here, anything else is stored at run time
            let literal = match &d.initializer {
                Some(Expr::Literal { value, loc }) => Some(super::expr::literal(ty, value, *loc)?),
                _ => None,
            };
            let (key, _) = self.frame.local(&d.name, ty, None);
            let dest = Slot::Frame(key.clone()).operand(None);
            let store = match (&d.initializer, &literal) {
                (Some(init), None) => self.store(dest.clone(), ty, init, scope)?,
                _ => Vec::new(),
            };
            let symbol = Symbol::Variable {
                ty,
                is_array: false,
                length: None,
                value: None,
                slot: Slot::Frame(key),
            };
            scope.declare(&d.name, symbol).map_err(|kind| kind.at(d.loc))?;

            let initial = literal.clone().unwrap_or_else(|| Value::default_of(ty));
            let lines = match self.depth {
                0 => chain!(
                    lines![Inst::push(initial).with_comment(comment)],
                    store
                )
                .collect(),
                _ => {
                    self.reserved.push(
                        Inst::push(Value::default_of(ty))
                            .with_comment(comment)
                            .at(d.loc)
                            .into(),
                    );
                    match literal {
                        Some(value) => lines![Inst::mov(dest, value)],
                        None if store.is_empty() => lines![Inst::mov(dest, Value::default_of(ty))],
                        None => store,
                    }
                }
            };
            code.extend(located(lines, d.loc));
        }
        Ok(code)
    }
}
