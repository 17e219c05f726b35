//! Columnar export of telemetry samples
//!
//! Converts one or more IBT files into a single Parquet file whose rows are
//! samples. The emitted schema always starts with two bookkeeping columns,
//! `session_id` and `sample_idx`, followed by one nullable column per
//! projected variable.
//!
//! Projection sources, in priority order:
//!
//! 1. `include_all = true` - every variable of the (first) file's dictionary
//! 2. `projection = [names...]` - ordered explicit list, case-insensitive
//! 3. neither - the built-in ML roster ([`DEFAULT_ROSTER`])

mod parquet;
mod roster;

pub use parquet::{export_parquet, export_parquet_multi};
pub use roster::DEFAULT_ROSTER;

/// Policy for explicit projection names that do not resolve against the
/// dictionary. The built-in roster always drops unresolved names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingVariable {
    /// Remove the name from the schema.
    #[default]
    Drop,
    /// Keep a column holding only nulls.
    NullColumn,
}

/// Options accepted by the exporters.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Project the full variable dictionary of the (first) file.
    pub include_all: bool,
    /// Ordered explicit projection, matched case-insensitively.
    pub projection: Option<Vec<String>>,
    /// Handling of unresolved explicit projection names.
    pub on_missing_variable: MissingVariable,
}

/// Multi-file export progress, delivered once per completed file.
#[derive(Debug, Clone, Copy)]
pub struct FileProgress<'a> {
    /// Zero-based index of the file that just finished.
    pub current: usize,
    /// Total number of input files.
    pub total: usize,
    /// Display name of the completed file.
    pub file_name: &'a str,
}
