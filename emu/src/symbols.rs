use arch::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Debug information emitted by the compiler alongside the instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolMap {
    pub code: IndexMap<String, CodeEntry>,
    pub data: IndexMap<String, DataEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub addr: usize,
    pub size: usize,
    pub ret: Type,
    /// Parameters and locals relative to the base pointer
    pub frame: IndexMap<String, FrameEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub offset: isize,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub offset: usize,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl SymbolMap {
    /// Function whose code contains `pc`.
    pub fn function_at(&self, pc: usize) -> Option<(&str, &CodeEntry)> {
        self.code
            .iter()
            .find(|(_, entry)| entry.addr <= pc && pc < entry.addr + entry.size)
            .map(|(name, entry)| (name.as_str(), entry))
    }
}
