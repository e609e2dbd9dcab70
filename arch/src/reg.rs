use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    IntoPrimitive,
    EnumIter,
    EnumCount,
    Display,
)]
#[repr(u8)]
pub enum Reg {
    #[default]
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    /// Return value of the last call
    RV,
    /// Array element index
    IX,
}

impl Reg {
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}
