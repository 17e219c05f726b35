//! BitField type for opaque bitset variables

use serde::{Deserialize, Serialize};

/// Opaque 32-bit bitset value.
///
/// The decoder preserves the raw integer; interpreting individual flag values
/// is left to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField(pub u32);

impl BitField {
    /// Create a new BitField from a u32 value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw u32 value.
    pub fn value(&self) -> u32 {
        self.0
    }
}
