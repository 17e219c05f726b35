//! Error types for IBT decoding and export.
//!
//! All errors implement the `std::error::Error` trait and carry enough
//! structured context to locate the failure: a file path, a byte offset, a
//! variable name, or a header index.
//!
//! ## Propagation policy
//!
//! - Header-decode and projection-validation errors abort the operation
//!   immediately.
//! - Per-sample read errors terminate the current iterator; the `Telemetry`
//!   handle stays open and a fresh iterator may be started.
//! - The exporter surfaces the first fatal error and removes any partially
//!   written output file.
//! - [`TelemetryError::Cancelled`] is cooperative and is never logged as an
//!   error by this crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for IBT decoding and Parquet export.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("truncated file: needed {needed} bytes at offset {offset}")]
    Truncated { offset: u64, needed: usize },

    #[error("unsupported SDK version {found} (expected {expected})")]
    UnsupportedVersion { expected: i32, found: i32 },

    #[error("variable header {index} carries unknown type tag {tag}")]
    UnknownVarType { index: usize, tag: i32 },

    #[error(
        "variable '{name}' reads past the frame: offset {offset} + {count} x {width} > buf_len {buf_len}"
    )]
    VarOutOfFrame { name: String, offset: i32, count: i32, width: usize, buf_len: i32 },

    #[error("malformed session info: {details}")]
    SessionInfoMalformed { details: String },

    #[error("projection resolved to no variables")]
    ProjectionEmpty,

    #[error("operation cancelled")]
    Cancelled,

    #[error("parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("arrow error while building record batch")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    #[error("parquet error while writing output")]
    Parquet {
        #[from]
        source: parquet::errors::ParquetError,
    },
}

impl TelemetryError {
    /// Map an `std::io::Error` to either `NotFound` or `Io`, keeping the path.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            TelemetryError::NotFound { path: path.into() }
        } else {
            TelemetryError::Io { path: path.into(), source }
        }
    }

    /// Helper constructor for residual parse errors with context.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Whether this error is a cooperative cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TelemetryError::Cancelled)
    }

    /// Returns whether the `Telemetry` handle that produced this error is
    /// still usable for new iterators and exports.
    pub fn handle_usable(&self) -> bool {
        match self {
            TelemetryError::Cancelled
            | TelemetryError::ProjectionEmpty
            | TelemetryError::Arrow { .. }
            | TelemetryError::Parquet { .. } => true,
            TelemetryError::NotFound { .. }
            | TelemetryError::Io { .. }
            | TelemetryError::Truncated { .. }
            | TelemetryError::UnsupportedVersion { .. }
            | TelemetryError::UnknownVarType { .. }
            | TelemetryError::VarOutOfFrame { .. }
            | TelemetryError::SessionInfoMalformed { .. }
            | TelemetryError::Parse { .. } => false,
        }
    }
}
