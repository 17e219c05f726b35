//! Core types for telemetry data representation.
//!
//! This module provides the foundational data structures for decoded IBT
//! telemetry:
//!
//! - [`VarType`] maps the on-disk type tags to Rust-side widths
//! - [`Value`] is the runtime sum type every sample read produces
//! - [`BitField`] wraps opaque bitset variables without interpreting them
//! - [`VariableInfo`] and [`VariableDict`] describe the frame layout with
//!   O(1) case-insensitive lookup

mod bitfield;
mod value;
mod variable;
mod variable_type;

pub use bitfield::BitField;
pub use value::Value;
pub use variable::{DecodeWarning, VariableDict, VariableInfo};
pub use variable_type::VarType;
