//! Decoder for iRacing IBT telemetry files with columnar Parquet export.
//!
//! `ibtx` reads the `.ibt` files iRacing records during a session (several
//! hundred fixed-rate channels per frame) and converts them into columnar
//! datasets suitable for ML pipelines.
//!
//! # Features
//!
//! - **Exact decoding**: explicit-width little-endian parsing of headers,
//!   variable dictionary, and sample frames
//! - **Streaming**: files routinely exceed 300 MB; iteration holds one
//!   frame in memory at a time
//! - **Session metadata**: the embedded YAML blob as a loose tree plus a
//!   stable derived session identifier
//! - **Parquet export**: single- and multi-file conversion with projection
//!   support and cooperative cancellation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ibtx::{export_parquet, CancellationToken, ExportOptions, Telemetry};
//!
//! fn main() -> ibtx::Result<()> {
//!     let mut telemetry = Telemetry::open("session.ibt")?;
//!     println!("session {}: {} frames", telemetry.session_id(), telemetry.num_samples());
//!
//!     let cancel = CancellationToken::new();
//!     let mut samples = telemetry.samples(cancel.clone());
//!     while let Some(view) = samples.next_sample()? {
//!         if let Some(speed) = view.get("Speed") {
//!             println!("frame {}: {:?} {}", view.index(), speed.value, speed.unit);
//!         }
//!     }
//!
//!     let rows = export_parquet(
//!         &mut telemetry,
//!         "session.parquet".as_ref(),
//!         &ExportOptions::default(),
//!         &cancel,
//!     )?;
//!     println!("wrote {rows} rows");
//!     Ok(())
//! }
//! ```

mod bytes;
mod error;
pub mod export;
pub mod ibt;
mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
mod yaml_utils;

pub use error::{Result, TelemetryError};

pub use ibt::{
    DiskSubHeader, FileHeader, OpenOptions, SampleEntry, SampleIter, SampleValue, SampleView,
    SessionInfoPolicy, Telemetry, VarHeader,
};

pub use export::{
    export_parquet, export_parquet_multi, ExportOptions, FileProgress, MissingVariable,
    DEFAULT_ROSTER,
};

pub use types::{BitField, DecodeWarning, Value, VarType, VariableDict, VariableInfo};

// Re-exported so callers do not need a direct tokio-util dependency for the
// cancellation contract.
pub use tokio_util::sync::CancellationToken;
