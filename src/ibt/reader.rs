//! Telemetry handle over an open IBT file
//!
//! [`Telemetry`] owns the byte source plus everything decoded from the
//! header regions: both fixed headers, the variable dictionary, the session
//! tree, and the derived session identifier. It is the only way to reach the
//! sample region, either streaming through [`Telemetry::samples`] or by
//! random access through [`Telemetry::sample_at`].
//!
//! ## Resource model
//!
//! The handle owns the file and closes it on drop. The variable dictionary
//! is immutable after construction. A sample iterator borrows the handle
//! exclusively for its lifetime; separate handles on different files are
//! fully independent.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use serde_yaml_ng::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::format::{self, DiskSubHeader, FileHeader};
use super::samples::{SampleIter, SampleView};
use crate::session;
use crate::types::{DecodeWarning, VariableDict};
use crate::{Result, TelemetryError};

/// Policy applied when the session-info YAML fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionInfoPolicy {
    /// Fail the open with `SessionInfoMalformed`.
    #[default]
    Fail,
    /// Continue with an empty session tree; the session id becomes `"-"`.
    Empty,
}

/// Options accepted by the open path.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub on_session_info_error: SessionInfoPolicy,
}

/// An open IBT file with its decoded headers, variable dictionary, and
/// session metadata.
pub struct Telemetry<R: Read + Seek = File> {
    source: R,
    path: PathBuf,
    header: FileHeader,
    disk_header: DiskSubHeader,
    variables: VariableDict,
    warnings: Vec<DecodeWarning>,
    session_info: Value,
    session_id: String,
    scratch: Vec<u8>,
}

impl Telemetry<File> {
    /// Open an IBT file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Open an IBT file.
    pub fn open_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TelemetryError::from_io(path, e))?;
        Self::from_source(file, path.to_path_buf(), options)
    }
}

impl<R: Read + Seek> Telemetry<R> {
    /// Build a handle from any random-access byte source.
    ///
    /// `path` only labels errors; in-memory sources typically pass something
    /// like `"<memory>"`.
    pub fn from_source(mut source: R, path: PathBuf, options: OpenOptions) -> Result<Self> {
        format::seek_or_io(&mut source, 0)?;
        let header = FileHeader::parse_from_reader(&mut source)?;
        header.validate()?;

        // The disk sub-header follows the file header contiguously, so the
        // cursor is already in place.
        let disk_header = DiskSubHeader::parse_from_reader(&mut source)?;
        if disk_header.record_count != header.num_buf {
            warn!(
                "record count mismatch in {}: disk sub-header reports {}, file header {}",
                path.display(),
                disk_header.record_count,
                header.num_buf
            );
        }

        let (variables, warnings) = format::decode_variables(&mut source, &header)?;
        let session_info = session::load_session_info(&mut source, &header, &options)?;
        let session_id = session::derive_session_id(&session_info);

        debug!(
            "opened {}: {} variables, {} frames, session '{}'",
            path.display(),
            variables.len(),
            header.num_buf,
            session_id
        );

        Ok(Self {
            source,
            path,
            header,
            disk_header,
            variables,
            warnings,
            session_info,
            session_id,
            scratch: Vec::new(),
        })
    }

    /// The decoded file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The decoded disk sub-header.
    pub fn disk_header(&self) -> &DiskSubHeader {
        &self.disk_header
    }

    /// The immutable variable dictionary, in file order.
    pub fn variables(&self) -> &VariableDict {
        &self.variables
    }

    /// Non-fatal oddities found while decoding the variable headers.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// The session-info tree. `Value::Null` when the file carries none or
    /// the open policy degraded a malformed blob.
    pub fn session_info(&self) -> &Value {
        &self.session_info
    }

    /// The derived `"{SubSessionID}-{SessionID}"` identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recording frequency in Hz, falling back to 60 for invalid headers.
    pub fn tick_rate(&self) -> f64 {
        if self.header.tick_rate > 0 { self.header.tick_rate as f64 } else { 60.0 }
    }

    /// Number of sample frames declared by the header.
    pub fn num_samples(&self) -> usize {
        self.header.num_buf.max(0) as usize
    }

    /// Stream the sample frames in file order.
    ///
    /// The iterator borrows this handle exclusively; each yielded view is
    /// valid until the next call. Dropping the iterator (including after a
    /// cancellation or read error) leaves the handle usable for a fresh
    /// iteration starting at frame 0.
    pub fn samples(&mut self, cancel: CancellationToken) -> SampleIter<'_, R> {
        SampleIter::new(self, cancel)
    }

    /// Random access to one frame with an O(1) seek.
    ///
    /// The returned view borrows a scratch buffer owned by the handle and is
    /// invalidated by the next `sample_at` call, exactly like the streaming
    /// views.
    pub fn sample_at(&mut self, index: usize, cancel: &CancellationToken) -> Result<SampleView<'_>> {
        if cancel.is_cancelled() {
            return Err(TelemetryError::Cancelled);
        }
        let total = self.num_samples();
        if index >= total {
            return Err(TelemetryError::parse(
                "sample access",
                format!("frame {index} out of range (0..{total})"),
            ));
        }

        let frame_len = self.header.buf_len as usize;
        let offset = self.frame_offset(index)?;
        format::seek_or_io(&mut self.source, offset)?;
        self.scratch.resize(frame_len, 0);
        format::read_exact_or_truncated(&mut self.source, &mut self.scratch, offset)?;

        Ok(SampleView::new(&self.scratch, &self.variables, index))
    }

    pub(crate) fn frame_offset(&self, index: usize) -> Result<u64> {
        let frame_len = self.header.buf_len as u64;
        (index as u64)
            .checked_mul(frame_len)
            .and_then(|o| o.checked_add(self.header.buf_offset as u64))
            .ok_or_else(|| {
                TelemetryError::parse("sample access", format!("frame {index} offset overflowed"))
            })
    }

    pub(crate) fn split_sample_state(
        &mut self,
    ) -> (&mut R, &VariableDict, &FileHeader, &Path) {
        (&mut self.source, &self.variables, &self.header, &self.path)
    }
}

impl<R: Read + Seek> std::fmt::Debug for Telemetry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("path", &self.path)
            .field("num_vars", &self.variables.len())
            .field("num_buf", &self.header.num_buf)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixtureBuilder;
    use anyhow::Result;
    use std::io::Cursor;

    fn open_fixture(image: Vec<u8>) -> crate::Result<Telemetry<Cursor<Vec<u8>>>> {
        Telemetry::from_source(Cursor::new(image), PathBuf::from("<memory>"), OpenOptions::default())
    }

    #[test]
    fn open_decodes_all_regions() -> Result<()> {
        let image = FixtureBuilder::new()
            .session_yaml("WeekendInfo:\n  SessionID: 10\n  SubSessionID: 20\n")
            .var_full("Speed", 4, 0, 1, false, "m/s", "GPS vehicle speed")
            .buf_len(4)
            .frame(12.5f32.to_le_bytes().to_vec())
            .build();

        let telemetry = open_fixture(image)?;
        assert_eq!(telemetry.header().version, 2);
        assert_eq!(telemetry.num_samples(), 1);
        assert_eq!(telemetry.variables().len(), 1);
        assert_eq!(telemetry.session_id(), "20-10");
        assert_eq!(telemetry.tick_rate(), 60.0);
        assert!(telemetry.warnings().is_empty());
        Ok(())
    }

    #[test]
    fn open_succeeds_with_no_frames() -> Result<()> {
        let image = FixtureBuilder::new().var("X", 4, 0, 1).buf_len(4).build();
        let mut telemetry = open_fixture(image)?;
        assert_eq!(telemetry.num_samples(), 0);

        let cancel = CancellationToken::new();
        let mut iter = telemetry.samples(cancel);
        assert!(iter.next_sample()?.is_none());
        Ok(())
    }

    #[test]
    fn open_succeeds_with_no_variables() -> Result<()> {
        let image = FixtureBuilder::new().build();
        let telemetry = open_fixture(image)?;
        assert!(telemetry.variables().is_empty());
        Ok(())
    }

    #[test]
    fn malformed_session_info_fails_by_default() {
        let image = FixtureBuilder::new()
            .session_yaml("WeekendInfo: [unclosed\n")
            .build();
        let err = open_fixture(image).unwrap_err();
        assert!(matches!(err, TelemetryError::SessionInfoMalformed { .. }));
    }

    #[test]
    fn malformed_session_info_degrades_under_empty_policy() -> Result<()> {
        let image = FixtureBuilder::new()
            .session_yaml("WeekendInfo: [unclosed\n")
            .build();
        let options =
            OpenOptions { on_session_info_error: SessionInfoPolicy::Empty };
        let telemetry =
            Telemetry::from_source(Cursor::new(image), PathBuf::from("<memory>"), options)?;
        assert_eq!(telemetry.session_info(), &Value::Null);
        assert_eq!(telemetry.session_id(), "-");
        Ok(())
    }

    #[test]
    fn sample_at_seeks_any_frame() -> Result<()> {
        let mut builder = FixtureBuilder::new().var("Tick", 2, 0, 1).buf_len(4);
        for i in 0..16i32 {
            builder = builder.frame(i.to_le_bytes().to_vec());
        }
        let mut telemetry = open_fixture(builder.build())?;

        let cancel = CancellationToken::new();
        let view = telemetry.sample_at(9, &cancel)?;
        assert_eq!(view.index(), 9);
        assert_eq!(view.get("Tick").unwrap().value.as_i32(), Some(9));

        // Out of range is an error, not a panic.
        assert!(telemetry.sample_at(16, &cancel).is_err());
        Ok(())
    }

    #[test]
    fn record_count_mismatch_is_tolerated() -> Result<()> {
        let image = FixtureBuilder::new()
            .var("Tick", 2, 0, 1)
            .buf_len(4)
            .frame(1i32.to_le_bytes().to_vec())
            .record_count(999)
            .build();
        let telemetry = open_fixture(image)?;
        assert_eq!(telemetry.num_samples(), 1);
        assert_eq!(telemetry.disk_header().record_count, 999);
        Ok(())
    }

    #[test]
    fn sample_at_observes_cancellation() -> Result<()> {
        let image = FixtureBuilder::new()
            .var("Tick", 2, 0, 1)
            .buf_len(4)
            .frame(1i32.to_le_bytes().to_vec())
            .build();
        let mut telemetry = open_fixture(image)?;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = telemetry.sample_at(0, &cancel).unwrap_err();
        assert!(err.is_cancelled());
        Ok(())
    }
}
