use arch::{Inst, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};

use crate::{error::ImageError, symbols::SymbolMap};

/// Serialized compiler output loaded by the emulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub instructions: Vec<Inst>,
    pub globals: Vec<Value>,
    #[serde(default)]
    pub symbols: SymbolMap,
}

impl Image {
    pub fn load(path: &str) -> Result<Self, ImageError> {
        let file = File::open(path).map_err(|e| ImageError::FileOpen(path.to_string(), e))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| ImageError::Format(path.to_string(), e))
    }

    pub fn save(&self, path: &str) -> Result<(), ImageError> {
        let file = File::create(path).map_err(|e| ImageError::FileCreate(path.to_string(), e))?;
        serde_yaml::to_writer(BufWriter::new(file), self)
            .map_err(|e| ImageError::Format(path.to_string(), e))
    }
}
