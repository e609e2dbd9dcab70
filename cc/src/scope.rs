use arch::{Operand, Ptr, Reg, Type, Value};
use indexmap::IndexMap;

use crate::error::ErrorKind;

/// Storage of a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Offset in the global region
    Global(usize),
    /// Key into the enclosing function's frame table
    Frame(String),
}

impl Slot {
    /// Operand addressing this slot, optionally indexed by a register.
    pub fn operand(&self, index: Option<Reg>) -> Operand {
        match self {
            Slot::Global(offset) => Operand::Ptr(Ptr {
                index,
                ..Ptr::global(*offset)
            }),
            Slot::Frame(key) => Operand::Var {
                name: key.clone(),
                index,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Variable {
        ty: Type,
        is_array: bool,
        length: Option<usize>,
        /// Compile-time value of an initialised global
        value: Option<Value>,
        slot: Slot,
    },
    Function {
        params: Vec<Type>,
        ret: Type,
        /// Implemented by the host rather than by compiled code
        external: bool,
        /// Accepts any number of extra arguments
        variadic: bool,
    },
}

/// One level of the scope chain. Lookups walk outward to the root.
#[derive(Debug, Default)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    symbols: IndexMap<String, Symbol>,
}

impl Scope<'static> {
    pub fn root() -> Self {
        Scope::default()
    }
}

impl<'p> Scope<'p> {
    pub fn child(&self) -> Scope<'_> {
        Scope {
            parent: Some(self),
            symbols: IndexMap::new(),
        }
    }

    /// Add `name` to this scope. Names in enclosing scopes may be shadowed.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), ErrorKind> {
        if self.symbols.contains_key(name) {
            return Err(ErrorKind::AlreadyDeclared(name.to_string()));
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Symbol declared in this scope only.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        match self.symbols.get(name) {
            Some(symbol) => Some(symbol),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&Symbol, ErrorKind> {
        self.lookup(name)
            .ok_or_else(|| ErrorKind::NotDeclared(name.to_string()))
    }
}
