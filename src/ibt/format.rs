//! IBT format structures and header decoding
//!
//! Parsing is explicit-width little-endian throughout; no struct is ever
//! transmuted from the byte image. Header decoding never touches the sample
//! region.

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::bytes;
use crate::types::{DecodeWarning, VarType, VariableDict, VariableInfo};
use crate::{Result, TelemetryError};

pub(crate) const FILE_HEADER_SIZE: usize = 112;
pub(crate) const DISK_SUBHEADER_SIZE: usize = 32;
pub(crate) const VAR_HEADER_SIZE: usize = 144;

const VAR_NAME_SIZE: usize = 32;
const VAR_DESC_SIZE: usize = 64;
const VAR_UNIT_SIZE: usize = 32;

/// First byte past the two fixed headers; every declared region offset must
/// point at or beyond it.
pub(crate) const HEADERS_END: i32 = (FILE_HEADER_SIZE + DISK_SUBHEADER_SIZE) as i32;

/// IBT file header: 28 little-endian int32 slots, 112 bytes.
///
/// Reserved slots are consumed during parsing but not retained. The `status`
/// word is opaque and stored verbatim.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub version: i32,
    pub status: i32,
    pub tick_rate: i32,
    pub session_info_update: i32,
    pub session_info_len: i32,
    pub session_info_offset: i32,
    pub num_vars: i32,
    pub var_header_offset: i32,
    pub num_buf: i32,
    pub buf_len: i32,
    pub buf_offset: i32,
}

impl FileHeader {
    /// Size of the file header in bytes.
    pub const SIZE: usize = FILE_HEADER_SIZE;

    pub fn parse_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        trace!("reading IBT file header ({FILE_HEADER_SIZE} bytes)");
        let mut raw = [0u8; FILE_HEADER_SIZE];
        read_exact_or_truncated(reader, &mut raw, 0)?;

        // Slot layout (int32 each): 0 version, 1 status, 2 tick_rate,
        // 3 session_info_update, 4 session_info_len, 5 session_info_offset,
        // 6 num_vars, 7 var_header_offset, 8 num_buf, 9 buf_len,
        // 10-12 reserved, 13 buf_offset, 14-27 reserved.
        let header = Self {
            version: bytes::read_i32(&raw, 0)?,
            status: bytes::read_i32(&raw, 4)?,
            tick_rate: bytes::read_i32(&raw, 8)?,
            session_info_update: bytes::read_i32(&raw, 12)?,
            session_info_len: bytes::read_i32(&raw, 16)?,
            session_info_offset: bytes::read_i32(&raw, 20)?,
            num_vars: bytes::read_i32(&raw, 24)?,
            var_header_offset: bytes::read_i32(&raw, 28)?,
            num_buf: bytes::read_i32(&raw, 32)?,
            buf_len: bytes::read_i32(&raw, 36)?,
            buf_offset: bytes::read_i32(&raw, 52)?,
        };

        debug!(
            "parsed IBT header: version={}, tick_rate={}, num_vars={}, num_buf={}, buf_len={}",
            header.version, header.tick_rate, header.num_vars, header.num_buf, header.buf_len
        );

        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 2 {
            return Err(TelemetryError::UnsupportedVersion { expected: 2, found: self.version });
        }

        for (name, offset) in [
            ("session_info_offset", self.session_info_offset),
            ("var_header_offset", self.var_header_offset),
            ("buf_offset", self.buf_offset),
        ] {
            if offset < HEADERS_END {
                return Err(TelemetryError::parse(
                    "header validation",
                    format!("{name} {offset} points inside the fixed headers"),
                ));
            }
        }

        if self.num_vars < 0 {
            return Err(TelemetryError::parse(
                "header validation",
                format!("negative variable count {}", self.num_vars),
            ));
        }

        if self.num_buf < 0 {
            return Err(TelemetryError::parse(
                "header validation",
                format!("negative sample count {}", self.num_buf),
            ));
        }

        if self.num_buf > 0 && self.buf_len <= 0 {
            return Err(TelemetryError::parse(
                "header validation",
                format!("buf_len {} with {} sample frames declared", self.buf_len, self.num_buf),
            ));
        }

        if self.session_info_len < 0 {
            return Err(TelemetryError::parse(
                "header validation",
                format!("negative session info length {}", self.session_info_len),
            ));
        }

        Ok(())
    }
}

/// Disk sub-header, following the file header contiguously.
///
/// `record_count` should match the file header's `num_buf` but is never
/// relied on; a mismatch is reported with a warning at open time.
#[derive(Debug, Clone, Copy)]
pub struct DiskSubHeader {
    pub start_date: f32,
    pub start_time: f64,
    pub end_time: f64,
    pub lap_count: i32,
    pub record_count: i32,
}

impl DiskSubHeader {
    /// Size of the disk sub-header in bytes, including 4 bytes of trailing
    /// padding.
    pub const SIZE: usize = DISK_SUBHEADER_SIZE;

    pub fn parse_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; DISK_SUBHEADER_SIZE];
        read_exact_or_truncated(reader, &mut raw, FILE_HEADER_SIZE as u64)?;

        // start_date @0 (f32), start_time @4 (f64), end_time @12 (f64),
        // lap_count @20, record_count @24, 4 bytes tail padding.
        Ok(Self {
            start_date: bytes::read_f32(&raw, 0)?,
            start_time: bytes::read_f64(&raw, 4)?,
            end_time: bytes::read_f64(&raw, 12)?,
            lap_count: bytes::read_i32(&raw, 20)?,
            record_count: bytes::read_i32(&raw, 24)?,
        })
    }
}

/// One decoded 144-byte variable header.
///
/// This is the raw record; [`VariableInfo`] is the validated dictionary entry
/// derived from it.
#[derive(Debug, Clone)]
pub struct VarHeader {
    pub var_type: VarType,
    pub offset: i32,
    pub count: i32,
    pub count_as_time: bool,
    pub name: String,
    pub description: String,
    pub unit: String,
}

impl VarHeader {
    /// Size of one variable header in bytes.
    pub const SIZE: usize = VAR_HEADER_SIZE;

    fn parse(raw: &[u8], index: usize) -> Result<Self> {
        let tag = bytes::read_i32(raw, 0)?;
        Ok(Self {
            var_type: VarType::from_tag(tag, index)?,
            offset: bytes::read_i32(raw, 4)?,
            count: bytes::read_i32(raw, 8)?,
            count_as_time: bytes::read_u8(raw, 12)? != 0,
            name: bytes::read_fixed_ascii(raw, 16, VAR_NAME_SIZE)?,
            description: bytes::read_fixed_ascii(raw, 48, VAR_DESC_SIZE)?,
            unit: bytes::read_fixed_ascii(raw, 112, VAR_UNIT_SIZE)?,
        })
    }
}

/// Decode the variable-header array into the frame dictionary.
///
/// Enforces, per header: a known type tag, `count >= 1`, `offset >= 0`, and
/// `offset + count * width <= buf_len`. Duplicate names (case-insensitive)
/// keep the first occurrence; duplicates and empty names are reported back as
/// [`DecodeWarning`]s rather than logged.
pub(crate) fn decode_variables<R: Read + Seek>(
    reader: &mut R,
    header: &FileHeader,
) -> Result<(VariableDict, Vec<DecodeWarning>)> {
    let num_vars = usize::try_from(header.num_vars).map_err(|_| {
        TelemetryError::parse(
            "variable headers",
            format!("variable count {} does not fit usize", header.num_vars),
        )
    })?;
    debug!("decoding {num_vars} variable headers");

    seek_or_io(reader, header.var_header_offset as u64)?;

    let mut dict = VariableDict::with_capacity(num_vars);
    let mut warnings = Vec::new();
    let mut raw = [0u8; VAR_HEADER_SIZE];

    for index in 0..num_vars {
        let region_offset = header.var_header_offset as u64 + (index * VAR_HEADER_SIZE) as u64;
        read_exact_or_truncated(reader, &mut raw, region_offset)?;

        let var = VarHeader::parse(&raw, index)?;
        trace!(
            "var {index}: '{}' type={:?} offset={} count={}",
            var.name, var.var_type, var.offset, var.count
        );

        if var.name.is_empty() {
            warnings.push(DecodeWarning::EmptyName { index });
            continue;
        }

        if var.count < 1 || var.offset < 0 {
            return Err(TelemetryError::parse(
                format!("variable header {index}"),
                format!("'{}' declares offset {} and count {}", var.name, var.offset, var.count),
            ));
        }

        let width = var.var_type.size();
        let end = var.offset as i64 + var.count as i64 * width as i64;
        if end > header.buf_len as i64 {
            return Err(TelemetryError::VarOutOfFrame {
                name: var.name,
                offset: var.offset,
                count: var.count,
                width,
                buf_len: header.buf_len,
            });
        }

        let info = VariableInfo {
            name: var.name,
            var_type: var.var_type,
            offset: var.offset as usize,
            count: var.count as usize,
            count_as_time: var.count_as_time,
            unit: var.unit,
            description: var.description,
        };
        if dict.push(info.clone()).is_some() {
            warnings.push(DecodeWarning::DuplicateName { index, name: info.name });
        }
    }

    debug!("decoded {} variables ({} warnings)", dict.len(), warnings.len());
    Ok((dict, warnings))
}

pub(crate) fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    offset: u64,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TelemetryError::Truncated { offset, needed: buf.len() }
        } else {
            TelemetryError::Io { path: "<source>".into(), source: e }
        }
    })
}

pub(crate) fn seek_or_io<R: Seek>(reader: &mut R, offset: u64) -> Result<()> {
    reader
        .seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|e| TelemetryError::Io { path: "<source>".into(), source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixtureBuilder;
    use std::io::Cursor;

    #[test]
    fn parse_header_fields() {
        let image = FixtureBuilder::new()
            .tick_rate(60)
            .status(0x11)
            .session_info_update(3)
            .session_yaml("WeekendInfo:\n  SessionID: 1\n")
            .var("Speed", 4, 0, 1)
            .buf_len(4)
            .build();

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        header.validate().unwrap();

        assert_eq!(header.version, 2);
        assert_eq!(header.status, 0x11);
        assert_eq!(header.tick_rate, 60);
        assert_eq!(header.session_info_update, 3);
        assert_eq!(header.num_vars, 1);
        assert_eq!(header.num_buf, 0);
        assert_eq!(header.buf_len, 4);
        assert_eq!(header.session_info_offset, HEADERS_END);
    }

    #[test]
    fn disk_sub_header_follows_contiguously() {
        let image = FixtureBuilder::new()
            .start_date(20123.0)
            .start_time(120.5)
            .end_time(360.25)
            .lap_count(7)
            .build();

        let mut cursor = Cursor::new(image);
        let _ = FileHeader::parse_from_reader(&mut cursor).unwrap();
        let disk = DiskSubHeader::parse_from_reader(&mut cursor).unwrap();

        assert_eq!(disk.start_date, 20123.0);
        assert_eq!(disk.start_time, 120.5);
        assert_eq!(disk.end_time, 360.25);
        assert_eq!(disk.lap_count, 7);
        assert_eq!(disk.record_count, 0);
    }

    #[test]
    fn version_other_than_two_is_rejected() {
        let image = FixtureBuilder::new().version(3).build();
        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        match header.validate().unwrap_err() {
            TelemetryError::UnsupportedVersion { expected, found } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn offsets_inside_fixed_headers_are_rejected() {
        let mut image = FixtureBuilder::new().var("Speed", 4, 0, 1).buf_len(4).build();
        // Corrupt var_header_offset (slot 7) to point into the header block.
        image[28..32].copy_from_slice(&100i32.to_le_bytes());

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        assert!(matches!(header.validate(), Err(TelemetryError::Parse { .. })));
    }

    #[test]
    fn frames_declared_without_frame_length_are_rejected() {
        let mut image = FixtureBuilder::new().build();
        image[32..36].copy_from_slice(&5i32.to_le_bytes()); // num_buf
        image[36..40].copy_from_slice(&0i32.to_le_bytes()); // buf_len

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        assert!(header.validate().is_err());
    }

    #[test]
    fn truncated_header_reports_offset_zero() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        match FileHeader::parse_from_reader(&mut cursor).unwrap_err() {
            TelemetryError::Truncated { offset, needed } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, FILE_HEADER_SIZE);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn variable_dictionary_round_trip() {
        let image = FixtureBuilder::new()
            .var_full("Speed", 4, 0, 1, false, "m/s", "GPS vehicle speed")
            .var_full("RPM", 4, 4, 1, false, "revs/min", "Engine rpm")
            .var_full("TireTemps", 4, 8, 4, false, "C", "Carcass temps")
            .buf_len(24)
            .build();

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        let _ = DiskSubHeader::parse_from_reader(&mut cursor).unwrap();
        let (dict, warnings) = decode_variables(&mut cursor, &header).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(dict.len(), 3);

        let speed = dict.get("Speed").unwrap();
        assert_eq!(speed.var_type, VarType::Float);
        assert_eq!(speed.offset, 0);
        assert_eq!(speed.unit, "m/s");
        assert_eq!(speed.description, "GPS vehicle speed");

        let temps = dict.get("tiretemps").unwrap();
        assert_eq!(temps.count, 4);
    }

    #[test]
    fn unknown_type_tag_names_the_header() {
        let image = FixtureBuilder::new()
            .var("Speed", 4, 0, 1)
            .var("Mystery", 7, 4, 1)
            .buf_len(8)
            .build();

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        let _ = DiskSubHeader::parse_from_reader(&mut cursor).unwrap();
        match decode_variables(&mut cursor, &header).unwrap_err() {
            TelemetryError::UnknownVarType { index, tag } => {
                assert_eq!(index, 1);
                assert_eq!(tag, 7);
            }
            other => panic!("expected UnknownVarType, got {other:?}"),
        }
    }

    #[test]
    fn variable_past_frame_end_is_rejected() {
        let image = FixtureBuilder::new()
            .var("Wide", 5, 0, 2) // two doubles need 16 bytes
            .buf_len(12)
            .build();

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        let _ = DiskSubHeader::parse_from_reader(&mut cursor).unwrap();
        match decode_variables(&mut cursor, &header).unwrap_err() {
            TelemetryError::VarOutOfFrame { name, buf_len, .. } => {
                assert_eq!(name, "Wide");
                assert_eq!(buf_len, 12);
            }
            other => panic!("expected VarOutOfFrame, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_reported_not_logged() {
        let image = FixtureBuilder::new()
            .var("Brake", 4, 0, 1)
            .var("BRAKE", 4, 4, 1)
            .buf_len(8)
            .build();

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        let _ = DiskSubHeader::parse_from_reader(&mut cursor).unwrap();
        let (dict, warnings) = decode_variables(&mut cursor, &header).unwrap();

        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("brake").unwrap().offset, 0);
        assert_eq!(
            warnings,
            vec![DecodeWarning::DuplicateName { index: 1, name: "BRAKE".to_string() }]
        );
    }

    #[test]
    fn non_ascii_name_bytes_do_not_crash_decoding() {
        let mut image = FixtureBuilder::new().var("Speed", 4, 0, 1).buf_len(4).build();
        // Poke a high byte into the middle of the stored name field.
        let name_field = image.len() - VAR_HEADER_SIZE + 16;
        image[name_field + 2] = 0xFE;

        let mut cursor = Cursor::new(image);
        let header = FileHeader::parse_from_reader(&mut cursor).unwrap();
        let _ = DiskSubHeader::parse_from_reader(&mut cursor).unwrap();
        let (dict, _) = decode_variables(&mut cursor, &header).unwrap();
        assert_eq!(dict.len(), 1);
    }
}
