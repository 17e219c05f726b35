//! YAML utilities for iRacing session metadata
//!
//! iRacing's YAML output has known non-standard issues: the blob is
//! NUL-padded to its declared length and can contain control characters that
//! break conforming parsers. This module extracts the blob from the file and
//! cleans it without parsing.

use std::io::{Read, Seek};

use crate::ibt::format::{read_exact_or_truncated, seek_or_io};
use crate::{Result, TelemetryError};

/// Read the declared session-info region and decode it as UTF-8 with
/// trailing NUL padding removed.
pub(crate) fn read_session_blob<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    len: usize,
) -> Result<String> {
    if len == 0 {
        return Ok(String::new());
    }

    seek_or_io(reader, offset)?;
    let mut raw = vec![0u8; len];
    read_exact_or_truncated(reader, &mut raw, offset)?;

    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    raw.truncate(end);

    String::from_utf8(raw).map_err(|e| TelemetryError::SessionInfoMalformed {
        details: format!("invalid UTF-8 at blob byte {}", e.utf8_error().valid_up_to()),
    })
}

/// Strip the control characters iRacing leaks into its YAML, keeping
/// newline, carriage return, and tab.
pub(crate) fn strip_control_characters(yaml: &str) -> String {
    let mut cleaned = String::with_capacity(yaml.len());
    for ch in yaml.chars() {
        match ch {
            '\x00'..='\x08' | '\x0B'..='\x0C' | '\x0E'..='\x1F' => continue,
            _ => cleaned.push(ch),
        }
    }
    cleaned
}
