//! Little-endian binary primitives.
//!
//! Every multi-byte read here is explicit-width and bounds-checked; nothing
//! depends on host endianness or struct layout. These helpers are the only
//! place raw scalar decoding happens, so all higher layers inherit the same
//! [`TelemetryError::Truncated`] behavior on short input.

use crate::{Result, TelemetryError};

pub(crate) fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or(TelemetryError::Truncated { offset: offset as u64, needed: 1 })
}

pub(crate) fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    let b = span(data, offset, 4)?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let b = span(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_f32(data: &[u8], offset: usize) -> Result<f32> {
    let b = span(data, offset, 4)?;
    Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_f64(data: &[u8], offset: usize) -> Result<f64> {
    let b = span(data, offset, 8)?;
    Ok(f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
}

/// Read exactly `len` bytes at `offset` and decode the prefix before the
/// first NUL as a string. The file format declares these fields ASCII; bytes
/// outside ASCII are passed through lossily rather than rejected.
pub(crate) fn read_fixed_ascii(data: &[u8], offset: usize, len: usize) -> Result<String> {
    let raw = span(data, offset, len)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn span(data: &[u8], offset: usize, needed: usize) -> Result<&[u8]> {
    data.get(offset..offset + needed)
        .ok_or(TelemetryError::Truncated { offset: offset as u64, needed })
}
