//! IBT file decoding
//!
//! An IBT (iRacing Binary Telemetry) file is a flat little-endian byte image:
//!
//! 1. **File header** (112 bytes) - 28 int32 slots locating every region
//! 2. **Disk sub-header** (32 bytes) - session timing and record counts
//! 3. **Session info** - YAML metadata blob at its declared offset
//! 4. **Variable headers** - N x 144-byte variable definitions
//! 5. **Sample frames** - M fixed-width frames of `buf_len` bytes each
//!
//! The last three regions are located by absolute offsets in the file header,
//! not by adjacency; decoding seeks.

pub(crate) mod format;
mod reader;
pub(crate) mod samples;

pub use format::{DiskSubHeader, FileHeader, VarHeader};
pub use reader::{OpenOptions, SessionInfoPolicy, Telemetry};
pub use samples::{SampleEntry, SampleIter, SampleValue, SampleView};
