use arch::{Operand, Ptr, Type};
use emu::FrameEntry;
use indexmap::IndexMap;

use crate::error::InternalError;

/// Base-pointer offsets of one function's parameters and locals.
///
/// Parameters count down from `EBP-1`, locals count up from `EBP+1`.
/// `EBP+0` holds the return link. Offsets are never handed out twice.
#[derive(Debug)]
pub struct Frame {
    entries: IndexMap<String, FrameEntry>,
    params: isize,
    next: isize,
}

impl Frame {
    pub fn new() -> Self {
        Frame {
            entries: IndexMap::new(),
            params: 0,
            next: 1,
        }
    }

    /// Unique key for `name`; shadowing declarations get `name#n`.
    fn key(&self, name: &str) -> String {
        if !self.entries.contains_key(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{}#{}", name, n))
            .find(|key| !self.entries.contains_key(key))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn param(&mut self, name: &str, ty: Type) -> String {
        self.params -= 1;
        let key = self.key(name);
        self.entries.insert(
            key.clone(),
            FrameEntry {
                offset: self.params,
                ty,
                length: None,
            },
        );
        key
    }

    /// Reserve `length` slots (1 for scalars) and return the key and base offset.
    pub fn local(&mut self, name: &str, ty: Type, length: Option<usize>) -> (String, isize) {
        let offset = self.next;
        self.next += length.unwrap_or(1) as isize;
        let key = self.key(name);
        self.entries.insert(key.clone(), FrameEntry { offset, ty, length });
        (key, offset)
    }

    pub fn offset(&self, key: &str) -> Option<isize> {
        self.entries.get(key).map(|entry| entry.offset)
    }

    pub fn into_entries(self) -> IndexMap<String, FrameEntry> {
        self.entries
    }

    /// Rewrite a pending variable into a base-pointer-relative pointer.
    pub fn resolve(&self, func: &str, operand: &mut Operand) -> Result<(), InternalError> {
        let Operand::Var { name, index } = operand else {
            return Ok(());
        };
        let offset = self
            .offset(name)
            .ok_or_else(|| InternalError::UnresolvedVariable(func.to_string(), name.clone()))?;
        let index = *index;
        *operand = Operand::Ptr(Ptr {
            index,
            ..Ptr::frame(offset)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::Reg;

    #[test]
    fn params_count_down_locals_count_up() {
        let mut frame = Frame::new();
        for name in ["a", "b", "c"] {
            frame.param(name, Type::Int);
        }
        frame.local("x", Type::Int, None);
        frame.local("buf", Type::Double, Some(4));
        frame.local("y", Type::String, None);
        let offsets: Vec<_> = ["a", "b", "c", "x", "buf", "y"]
            .iter()
            .map(|key| frame.offset(key))
            .collect();
        assert_eq!(
            offsets,
            [Some(-1), Some(-2), Some(-3), Some(1), Some(2), Some(6)]
        );
    }

    #[test]
    fn shadowing_gets_a_new_slot() {
        let mut frame = Frame::new();
        assert_eq!(frame.local("x", Type::Int, None), ("x".to_string(), 1));
        assert_eq!(frame.local("x", Type::Int, None), ("x#1".to_string(), 2));
        assert_eq!(frame.local("x", Type::Int, None), ("x#2".to_string(), 3));
    }

    #[test]
    fn resolve_pending() {
        let mut frame = Frame::new();
        frame.local("arr", Type::Int, Some(3));
        let mut operand = Operand::Var {
            name: "arr".into(),
            index: Some(Reg::IX),
        };
        frame.resolve("main", &mut operand).unwrap();
        assert_eq!(operand.to_string(), "EBP+1+IX");

        let mut missing = Operand::var("nope");
        assert_eq!(
            frame.resolve("main", &mut missing),
            Err(InternalError::UnresolvedVariable("main".into(), "nope".into()))
        );
    }
}
