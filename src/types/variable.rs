//! Variable dictionary and per-variable metadata

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::VarType;

/// Metadata for one telemetry variable, decoded from its 144-byte header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableInfo {
    /// Variable name exactly as stored in the file
    pub name: String,
    /// Element type
    pub var_type: VarType,
    /// Byte offset of the first element within a sample frame
    pub offset: usize,
    /// Number of elements (1 for scalar, >1 for arrays)
    pub count: usize,
    /// Whether the simulator treats the sample count as elapsed time
    pub count_as_time: bool,
    /// Units of measurement (e.g. "m/s", "C", "kg")
    pub unit: String,
    /// Human-readable description
    pub description: String,
}

/// Warnings produced while decoding the variable-header array.
///
/// These are returned to the caller through the open path rather than logged,
/// so tooling can surface them next to the file they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// A later header reused an existing name (compared case-insensitively);
    /// the first occurrence stays in the dictionary.
    DuplicateName { index: usize, name: String },
    /// A header carried an empty name field and was skipped.
    EmptyName { index: usize },
}

/// The ordered variable dictionary: the schema of every frame in the file.
///
/// Variables keep their file order; lookup is case-insensitive through a
/// second index keyed on a lowercased copy of each name. The stored names are
/// never altered.
#[derive(Debug, Clone, Default)]
pub struct VariableDict {
    vars: Vec<VariableInfo>,
    by_lower_name: HashMap<String, usize>,
}

impl VariableDict {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { vars: Vec::with_capacity(capacity), by_lower_name: HashMap::with_capacity(capacity) }
    }

    /// Insert a decoded variable, keeping the first occurrence of a name.
    /// Returns the index of the previously stored variable on collision.
    pub(crate) fn push(&mut self, info: VariableInfo) -> Option<usize> {
        let key = info.name.to_ascii_lowercase();
        if let Some(&existing) = self.by_lower_name.get(&key) {
            return Some(existing);
        }
        let index = self.vars.len();
        self.vars.push(info);
        self.by_lower_name.insert(key, index);
        None
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&VariableInfo> {
        self.index_of(name).map(|i| &self.vars[i])
    }

    /// Case-insensitive lookup returning the variable's file-order index.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_lower_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, VariableInfo> {
        self.vars.iter()
    }
}

impl<'a> IntoIterator for &'a VariableDict {
    type Item = &'a VariableInfo;
    type IntoIter = std::slice::Iter<'a, VariableInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}
