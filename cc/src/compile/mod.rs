mod expr;
mod frame;
mod func;
mod global;

pub use frame::Frame;

use arch::{Inst, Location, Operand, Type};
use emu::{CodeEntry, Image, Program, SymbolMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    ast,
    error::{CompilerError, Error, ErrorKind},
    link::{self, lines, Line},
    scope::{Scope, Symbol},
};
use func::FuncCompiler;
use global::Data;

/// Label one past the last instruction. Returning from `main` lands here.
pub const HALT: &str = "__halt";

/// Signature of a host function callable from compiled code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default = "void")]
    pub ret: Type,
    /// Extra arguments of any type are accepted after `params`
    #[serde(default)]
    pub variadic: bool,
}

fn void() -> Type {
    Type::Void
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    externs: IndexMap<String, ExternDecl>,
}

/// Compile with no host functions declared.
pub fn compile(root: &ast::Root) -> Result<Program, Error> {
    Compiler::new().compile(root)
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_extern(self, name: &str, params: &[Type], ret: Type) -> Self {
        self.declare(ExternDecl {
            name: name.to_string(),
            params: params.to_vec(),
            ret,
            variadic: false,
        })
    }

    pub fn declare(mut self, decl: ExternDecl) -> Self {
        self.externs.insert(decl.name.clone(), decl);
        self
    }

    /// `print` and `println`, as registered by the emulator.
    pub fn with_builtins(self) -> Self {
        ["print", "println"].into_iter().fold(self, |compiler, name| {
            compiler.declare(ExternDecl {
                name: name.to_string(),
                params: vec![],
                ret: Type::Void,
                variadic: true,
            })
        })
    }

    pub fn compile(&self, root: &ast::Root) -> Result<Program, Error> {
        self.compile_image(root).map(Program::from)
    }

    pub fn compile_image(&self, root: &ast::Root) -> Result<Image, Error> {
        let mut global = Scope::root();
        for decl in self.externs.values() {
            let symbol = Symbol::Function {
                params: decl.params.clone(),
                ret: decl.ret,
                external: true,
                variadic: decl.variadic,
            };
            global
                .declare(&decl.name, symbol)
                .map_err(|kind| kind.at(Location::default()))?;
        }

        // Signatures first so calls may refer to later functions
        for stmt in &root.statements {
            if let ast::Stmt::FunctionDeclaration(func) = stmt {
                let symbol = Symbol::Function {
                    params: signature(func)?,
                    ret: func.return_type,
                    external: false,
                    variadic: false,
                };
                global
                    .declare(&func.name, symbol)
                    .map_err(|kind| kind.at(func.loc))?;
            }
        }

        let mut data = Data::default();
        let mut funcs = Vec::new();
        for stmt in &root.statements {
            match stmt {
                ast::Stmt::VariableDeclaration(decl) => data.declare(decl, &mut global)?,
                ast::Stmt::FunctionDeclaration(func) => {
                    funcs.push(FuncCompiler::compile(func, &global, &mut data)?)
                }
                other => return Err(ErrorKind::IllegalTopLevel.at(other.loc()).into()),
            }
        }

        let has_main = matches!(
            global.get("main"),
            Some(Symbol::Function {
                external: false,
                ..
            })
        );
        let mut code = if has_main {
            lines![
                Inst::call(Operand::label("main"), 0).with_comment("main"),
                Inst::jmp(Operand::label(HALT)),
            ]
        } else {
            lines![Inst::jmp(Operand::label(HALT))]
        };

        let mut symbols = SymbolMap::default();
        let mut addr = count(&code);
        for func in funcs {
            let size = count(&func.lines);
            symbols.code.insert(
                func.name.clone(),
                CodeEntry {
                    addr,
                    size,
                    ret: func.ret,
                    frame: func.frame.into_entries(),
                },
            );
            addr += size;
            code.extend(func.lines);
        }
        code.push(Line::Label(HALT.to_string()));

        let instructions = link::assemble(code)?;
        link::check_resolved(&instructions)?;
        let (globals, data) = data.finish();
        symbols.data = data;

        Ok(Image {
            instructions,
            globals,
            symbols,
        })
    }
}

fn count(lines: &[Line]) -> usize {
    lines
        .iter()
        .filter(|line| matches!(line, Line::Inst(_)))
        .count()
}

/// Parameter types of a function, rejecting array and defaulted parameters.
fn signature(func: &ast::FunctionDeclaration) -> Result<Vec<Type>, CompilerError> {
    if func.name == "main" && !func.parameters.is_empty() {
        return Err(ErrorKind::MainParameters.at(func.loc));
    }
    let mut params = Vec::new();
    for decl in &func.parameters {
        if decl.ty == Type::Void {
            return Err(ErrorKind::VoidVariable.at(decl.loc));
        }
        for d in &decl.declarators {
            if decl.is_array {
                return Err(ErrorKind::ArrayParameter(d.name.clone()).at(d.loc));
            }
            if d.initializer.is_some() {
                return Err(ErrorKind::ParameterInitializer(d.name.clone()).at(d.loc));
            }
            params.push(decl.ty);
        }
    }
    Ok(params)
}

/// Element count of an array declarator.
fn array_length(d: &ast::VariableDeclarator) -> Result<usize, CompilerError> {
    if d.initializer.is_some() {
        return Err(ErrorKind::ArrayInitializer(d.name.clone()).at(d.loc));
    }
    match d.length {
        Some(length) if length > 0 => Ok(length),
        _ => Err(ErrorKind::ArrayLength(d.name.clone()).at(d.loc)),
    }
}

/// Attribute instructions without an origin to `loc`.
fn located(mut code: Vec<Line>, loc: Location) -> Vec<Line> {
    for line in code.iter_mut() {
        if let Line::Inst(inst) = line {
            if inst.origin.is_none() {
                inst.origin = Some(loc);
            }
        }
    }
    code
}
