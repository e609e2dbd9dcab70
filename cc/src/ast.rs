use arch::{Location, Type, Value};
use serde::{Deserialize, Serialize};
use serde_yaml::with::singleton_map_recursive;

/// Root of a parsed program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Root {
    pub statements: Vec<Stmt>,
}

/// Node kinds are single-key maps in YAML (`Literal: { value: 1 }`), not `!Tag`s.
impl Root {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(text))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut out: Vec<u8> = Vec::new();
        singleton_map_recursive::serialize(self, &mut serde_yaml::Serializer::new(&mut out))?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<VariableDeclaration>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    pub return_type: Type,
    #[serde(default)]
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub is_array: bool,
    pub declarators: Vec<VariableDeclarator>,
    #[serde(default)]
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclarator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
    /// Element count of an array declarator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default)]
    pub loc: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "+")]
    Pos,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "++")]
    Inc,
    #[serde(rename = "--")]
    Dec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "!",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        value: Value,
        #[serde(default)]
        loc: Location,
    },
    Identifier {
        name: String,
        #[serde(default)]
        loc: Location,
    },
    BinaryExpression {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default)]
        loc: Location,
    },
    UnaryExpression {
        op: UnaryOp,
        argument: Box<Expr>,
        /// `++x` rather than `x++`
        #[serde(default)]
        prefix: bool,
        #[serde(default)]
        loc: Location,
    },
    AssignmentExpression {
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default)]
        loc: Location,
    },
    CallExpression {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        loc: Location,
    },
    MemberExpression {
        base: Box<Expr>,
        index: Box<Expr>,
        #[serde(default)]
        loc: Location,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    FunctionDeclaration(FunctionDeclaration),
    VariableDeclaration(VariableDeclaration),
    Block {
        body: Vec<Stmt>,
        #[serde(default)]
        loc: Location,
    },
    If {
        test: Expr,
        consequent: Box<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alternate: Option<Box<Stmt>>,
        #[serde(default)]
        loc: Location,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        #[serde(default)]
        loc: Location,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
        #[serde(default)]
        loc: Location,
    },
    For {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        init: Option<Box<Stmt>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        test: Option<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        update: Option<Expr>,
        body: Box<Stmt>,
        #[serde(default)]
        loc: Location,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        argument: Option<Expr>,
        #[serde(default)]
        loc: Location,
    },
    Break {
        #[serde(default)]
        loc: Location,
    },
    Continue {
        #[serde(default)]
        loc: Location,
    },
    ExpressionStatement {
        expression: Expr,
        #[serde(default)]
        loc: Location,
    },
}

impl Expr {
    pub fn loc(&self) -> Location {
        match self {
            Expr::Literal { loc, .. }
            | Expr::Identifier { loc, .. }
            | Expr::BinaryExpression { loc, .. }
            | Expr::UnaryExpression { loc, .. }
            | Expr::AssignmentExpression { loc, .. }
            | Expr::CallExpression { loc, .. }
            | Expr::MemberExpression { loc, .. } => *loc,
        }
    }

    /// Set the source location of this node.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        match &mut self {
            Expr::Literal { loc, .. }
            | Expr::Identifier { loc, .. }
            | Expr::BinaryExpression { loc, .. }
            | Expr::UnaryExpression { loc, .. }
            | Expr::AssignmentExpression { loc, .. }
            | Expr::CallExpression { loc, .. }
            | Expr::MemberExpression { loc, .. } => *loc = Location::new(line, column),
        }
        self
    }
}

impl Stmt {
    pub fn loc(&self) -> Location {
        match self {
            Stmt::FunctionDeclaration(f) => f.loc,
            Stmt::VariableDeclaration(d) => d.loc,
            Stmt::Block { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::While { loc, .. }
            | Stmt::DoWhile { loc, .. }
            | Stmt::For { loc, .. }
            | Stmt::Return { loc, .. }
            | Stmt::Break { loc }
            | Stmt::Continue { loc }
            | Stmt::ExpressionStatement { loc, .. } => *loc,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        let at = Location::new(line, column);
        match &mut self {
            Stmt::FunctionDeclaration(f) => f.loc = at,
            Stmt::VariableDeclaration(d) => d.loc = at,
            Stmt::Block { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::While { loc, .. }
            | Stmt::DoWhile { loc, .. }
            | Stmt::For { loc, .. }
            | Stmt::Return { loc, .. }
            | Stmt::Break { loc }
            | Stmt::Continue { loc }
            | Stmt::ExpressionStatement { loc, .. } => *loc = at,
        }
        self
    }
}

/// Shorthand constructors for building trees by hand.
pub mod build {
    use super::*;

    pub fn lit(value: impl Into<Value>) -> Expr {
        Expr::Literal {
            value: value.into(),
            loc: Location::default(),
        }
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Identifier {
            name: name.to_string(),
            loc: Location::default(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryExpression {
            op,
            left: Box::new(left),
            right: Box::new(right),
            loc: Location::default(),
        }
    }

    pub fn unary(op: UnaryOp, argument: Expr) -> Expr {
        Expr::UnaryExpression {
            op,
            argument: Box::new(argument),
            prefix: true,
            loc: Location::default(),
        }
    }

    pub fn postfix(op: UnaryOp, argument: Expr) -> Expr {
        Expr::UnaryExpression {
            op,
            argument: Box::new(argument),
            prefix: false,
            loc: Location::default(),
        }
    }

    pub fn assign(left: Expr, right: Expr) -> Expr {
        Expr::AssignmentExpression {
            left: Box::new(left),
            right: Box::new(right),
            loc: Location::default(),
        }
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Expr {
        Expr::CallExpression {
            callee: Box::new(ident(callee)),
            args,
            loc: Location::default(),
        }
    }

    pub fn member(base: &str, index: Expr) -> Expr {
        Expr::MemberExpression {
            base: Box::new(ident(base)),
            index: Box::new(index),
            loc: Location::default(),
        }
    }

    pub fn declarator(name: &str, initializer: Option<Expr>) -> VariableDeclarator {
        VariableDeclarator {
            name: name.to_string(),
            initializer,
            length: None,
            loc: Location::default(),
        }
    }

    pub fn decl(ty: Type, declarators: Vec<VariableDeclarator>) -> VariableDeclaration {
        VariableDeclaration {
            ty,
            is_array: false,
            declarators,
            loc: Location::default(),
        }
    }

    /// `ty name = init;`
    pub fn var(ty: Type, name: &str, init: Option<Expr>) -> Stmt {
        Stmt::VariableDeclaration(decl(ty, vec![declarator(name, init)]))
    }

    /// `ty name[length];`
    pub fn array(ty: Type, name: &str, length: usize) -> Stmt {
        Stmt::VariableDeclaration(VariableDeclaration {
            ty,
            is_array: true,
            declarators: vec![VariableDeclarator {
                length: Some(length),
                ..declarator(name, None)
            }],
            loc: Location::default(),
        })
    }

    pub fn param(ty: Type, name: &str) -> VariableDeclaration {
        decl(ty, vec![declarator(name, None)])
    }

    pub fn func(name: &str, parameters: Vec<VariableDeclaration>, ret: Type, body: Vec<Stmt>) -> Stmt {
        Stmt::FunctionDeclaration(FunctionDeclaration {
            name: name.to_string(),
            parameters,
            body,
            return_type: ret,
            loc: Location::default(),
        })
    }

    pub fn expr(expression: Expr) -> Stmt {
        Stmt::ExpressionStatement {
            expression,
            loc: Location::default(),
        }
    }

    pub fn block(body: Vec<Stmt>) -> Stmt {
        Stmt::Block {
            body,
            loc: Location::default(),
        }
    }

    pub fn if_else(test: Expr, consequent: Stmt, alternate: Option<Stmt>) -> Stmt {
        Stmt::If {
            test,
            consequent: Box::new(consequent),
            alternate: alternate.map(Box::new),
            loc: Location::default(),
        }
    }

    pub fn while_loop(test: Expr, body: Stmt) -> Stmt {
        Stmt::While {
            test,
            body: Box::new(body),
            loc: Location::default(),
        }
    }

    pub fn do_while(body: Stmt, test: Expr) -> Stmt {
        Stmt::DoWhile {
            body: Box::new(body),
            test,
            loc: Location::default(),
        }
    }

    pub fn for_loop(init: Option<Stmt>, test: Option<Expr>, update: Option<Expr>, body: Stmt) -> Stmt {
        Stmt::For {
            init: init.map(Box::new),
            test,
            update,
            body: Box::new(body),
            loc: Location::default(),
        }
    }

    pub fn ret(argument: Option<Expr>) -> Stmt {
        Stmt::Return {
            argument,
            loc: Location::default(),
        }
    }

    pub fn brk() -> Stmt {
        Stmt::Break {
            loc: Location::default(),
        }
    }

    pub fn cont() -> Stmt {
        Stmt::Continue {
            loc: Location::default(),
        }
    }

    pub fn root(statements: Vec<Stmt>) -> Root {
        Root { statements }
    }
}
