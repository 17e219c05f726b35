//! Telemetry variable type definitions

use serde::{Deserialize, Serialize};

use crate::{Result, TelemetryError};

/// Supported telemetry data types.
/// Maps the closed set of type tags used in IBT variable headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarType {
    /// 8-bit ASCII character; arrays of Char are exposed as strings (tag 0)
    Char,
    /// Boolean stored as one byte, false iff zero (tag 1)
    Bool,
    /// 32-bit signed two's-complement integer (tag 2)
    Int,
    /// 32-bit opaque bitset (tag 3)
    BitField,
    /// IEEE-754 binary32 (tag 4)
    Float,
    /// IEEE-754 binary64 (tag 5)
    Double,
}

impl VarType {
    /// Decode an on-disk type tag. `index` is the variable header's position
    /// in the header array, used to locate the failure.
    pub fn from_tag(tag: i32, index: usize) -> Result<Self> {
        match tag {
            0 => Ok(VarType::Char),
            1 => Ok(VarType::Bool),
            2 => Ok(VarType::Int),
            3 => Ok(VarType::BitField),
            4 => Ok(VarType::Float),
            5 => Ok(VarType::Double),
            _ => Err(TelemetryError::UnknownVarType { index, tag }),
        }
    }

    /// Byte width of one element of this type inside a sample frame.
    pub const fn size(&self) -> usize {
        match self {
            VarType::Char | VarType::Bool => 1,
            VarType::Int | VarType::BitField | VarType::Float => 4,
            VarType::Double => 8,
        }
    }
}
