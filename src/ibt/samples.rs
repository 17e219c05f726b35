//! Streaming sample access
//!
//! [`SampleIter`] walks the frame region in file order with a single reused
//! frame buffer, so peak working set is one frame regardless of file size.
//! Each [`SampleView`] is valid until the next frame is produced; re-reading
//! a file means constructing a new iterator from the handle.
//!
//! Typed reads go directly against the frame buffer at the offsets the
//! variable dictionary declares. Scalars decode without allocation; arrays
//! allocate exactly `count` elements; Char variables decode to strings
//! (NUL-terminated within their declared count).

use std::io::{Read, Seek, SeekFrom};

use tokio_util::sync::CancellationToken;

use super::reader::Telemetry;
use crate::types::{BitField, Value, VarType, VariableDict, VariableInfo};
use crate::{bytes, Result, TelemetryError};

/// Single-pass iterator over the sample frames of one file.
///
/// Borrows the [`Telemetry`] handle exclusively. The cancellation token is
/// observed before every frame read; after cancellation or a read error the
/// iterator is finished, but the handle remains usable for a fresh pass.
pub struct SampleIter<'a, R: Read + Seek> {
    telemetry: &'a mut Telemetry<R>,
    cancel: CancellationToken,
    buf: Vec<u8>,
    next_index: usize,
    positioned: bool,
    finished: bool,
}

impl<'a, R: Read + Seek> SampleIter<'a, R> {
    pub(crate) fn new(telemetry: &'a mut Telemetry<R>, cancel: CancellationToken) -> Self {
        Self { telemetry, cancel, buf: Vec::new(), next_index: 0, positioned: false, finished: false }
    }

    /// Index of the next frame to be yielded.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Advance to the next frame.
    ///
    /// Returns `Ok(None)` after the final frame. A cancellation or read
    /// error finishes the iterator; subsequent calls return `Ok(None)`.
    pub fn next_sample(&mut self) -> Result<Option<SampleView<'_>>> {
        if self.finished {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.finished = true;
            return Err(TelemetryError::Cancelled);
        }
        if self.next_index >= self.telemetry.num_samples() {
            self.finished = true;
            return Ok(None);
        }

        let index = self.next_index;
        let frame_offset = self.telemetry.frame_offset(index)?;
        let (source, variables, header, path) = self.telemetry.split_sample_state();
        let frame_len = header.buf_len as usize;

        // Frames are contiguous, so one seek positions the whole pass.
        if !self.positioned {
            if let Err(e) = source.seek(SeekFrom::Start(frame_offset)) {
                self.finished = true;
                return Err(TelemetryError::Io { path: path.to_path_buf(), source: e });
            }
            self.positioned = true;
        }

        self.buf.resize(frame_len, 0);
        if let Err(e) = source.read_exact(&mut self.buf) {
            self.finished = true;
            return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TelemetryError::Truncated { offset: frame_offset, needed: frame_len }
            } else {
                TelemetryError::Io { path: path.to_path_buf(), source: e }
            });
        }

        self.next_index += 1;
        Ok(Some(SampleView::new(&self.buf, variables, index)))
    }
}

/// A typed view over one sample frame.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    frame: &'a [u8],
    variables: &'a VariableDict,
    index: usize,
}

/// One variable's decoded value together with its dictionary metadata.
#[derive(Debug, Clone)]
pub struct SampleValue<'a> {
    pub name: &'a str,
    pub unit: &'a str,
    pub description: &'a str,
    pub value: Value,
}

/// One `to_map` entry.
#[derive(Debug, Clone)]
pub struct SampleEntry<'a> {
    pub name: &'a str,
    pub value: Value,
    pub unit: &'a str,
}

impl<'a> SampleView<'a> {
    pub(crate) fn new(frame: &'a [u8], variables: &'a VariableDict, index: usize) -> Self {
        Self { frame, variables, index }
    }

    /// Frame index within the file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn frame(&self) -> &'a [u8] {
        self.frame
    }

    /// Case-insensitive typed read of one variable.
    ///
    /// Returns `None` when the name is not in the dictionary.
    pub fn get(&self, name: &str) -> Option<SampleValue<'a>> {
        let info = self.variables.get(name)?;
        let value = decode_value(self.frame, info).ok()?;
        Some(SampleValue {
            name: &info.name,
            unit: &info.unit,
            description: &info.description,
            value,
        })
    }

    /// Decode every variable in dictionary order.
    pub fn to_map(&self) -> Vec<SampleEntry<'a>> {
        self.variables
            .iter()
            .filter_map(|info| {
                let value = decode_value(self.frame, info).ok()?;
                Some(SampleEntry { name: &info.name, value, unit: &info.unit })
            })
            .collect()
    }
}

/// Decode one variable from a frame buffer.
///
/// Char variables become strings regardless of arity; every other type is a
/// scalar for `count == 1` and an array otherwise.
pub(crate) fn decode_value(frame: &[u8], info: &VariableInfo) -> Result<Value> {
    if info.var_type == VarType::Char {
        let raw = frame.get(info.offset..info.offset + info.count).ok_or(
            TelemetryError::Truncated { offset: info.offset as u64, needed: info.count },
        )?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(info.count);
        return Ok(Value::String(String::from_utf8_lossy(&raw[..end]).into_owned()));
    }

    if info.count == 1 {
        return scalar_at(frame, info.var_type, info.offset);
    }

    let width = info.var_type.size();
    let mut items = Vec::with_capacity(info.count);
    for i in 0..info.count {
        items.push(scalar_at(frame, info.var_type, info.offset + i * width)?);
    }
    Ok(Value::Array(items))
}

/// Decode one scalar element at an absolute frame offset.
pub(crate) fn scalar_at(frame: &[u8], var_type: VarType, offset: usize) -> Result<Value> {
    Ok(match var_type {
        VarType::Char => {
            let byte = bytes::read_u8(frame, offset)?;
            let s = if byte == 0 { String::new() } else { (byte as char).to_string() };
            Value::String(s)
        }
        VarType::Bool => Value::Bool(bytes::read_u8(frame, offset)? != 0),
        VarType::Int => Value::Int(bytes::read_i32(frame, offset)?),
        VarType::BitField => Value::BitField(BitField::new(bytes::read_u32(frame, offset)?)),
        VarType::Float => Value::Float(bytes::read_f32(frame, offset)?),
        VarType::Double => Value::Double(bytes::read_f64(frame, offset)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibt::OpenOptions;
    use crate::test_utils::FixtureBuilder;
    use anyhow::{ensure, Result};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn open(image: Vec<u8>) -> Telemetry<Cursor<Vec<u8>>> {
        Telemetry::from_source(Cursor::new(image), PathBuf::from("<memory>"), OpenOptions::default())
            .expect("fixture should open")
    }

    fn mixed_fixture(frames: usize) -> Telemetry<Cursor<Vec<u8>>> {
        let mut builder = FixtureBuilder::new()
            .var_full("Speed", 4, 0, 1, false, "m/s", "GPS vehicle speed")
            .var_full("RPM", 2, 4, 1, false, "revs/min", "Engine rpm")
            .var_full("OnTrack", 1, 8, 1, false, "", "Is the car on track")
            .buf_len(9);
        for i in 0..frames {
            let mut frame = Vec::with_capacity(9);
            frame.extend_from_slice(&(i as f32 * 1.5).to_le_bytes());
            frame.extend_from_slice(&(5000 + i as i32).to_le_bytes());
            frame.push((i % 2) as u8);
            builder = builder.frame(frame);
        }
        open(builder.build())
    }

    #[test]
    fn iteration_yields_every_frame_in_order() -> Result<()> {
        let mut telemetry = mixed_fixture(25);
        let mut iter = telemetry.samples(CancellationToken::new());

        let mut seen = 0usize;
        while let Some(view) = iter.next_sample()? {
            ensure!(view.index() == seen, "frame {} out of order", view.index());
            ensure!(view.get("RPM").unwrap().value.as_i32() == Some(5000 + seen as i32));
            seen += 1;
        }
        assert_eq!(seen, 25);

        // The iterator is exhausted, not restartable.
        assert!(iter.next_sample()?.is_none());
        Ok(())
    }

    #[test]
    fn lookup_is_case_insensitive() -> Result<()> {
        let mut telemetry = mixed_fixture(1);
        let mut iter = telemetry.samples(CancellationToken::new());
        let view = iter.next_sample()?.unwrap();

        let a = view.get("Speed").unwrap();
        let b = view.get("speed").unwrap();
        let c = view.get("SPEED").unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(b.value, c.value);
        assert_eq!(a.name, "Speed");
        assert_eq!(a.unit, "m/s");
        assert_eq!(a.description, "GPS vehicle speed");
        assert!(view.get("NotAVariable").is_none());
        Ok(())
    }

    #[test]
    fn to_map_covers_the_dictionary_in_order() -> Result<()> {
        let mut telemetry = mixed_fixture(1);
        let mut iter = telemetry.samples(CancellationToken::new());
        let view = iter.next_sample()?.unwrap();

        let map = view.to_map();
        let names: Vec<&str> = map.iter().map(|e| e.name).collect();
        assert_eq!(names, ["Speed", "RPM", "OnTrack"]);
        assert_eq!(map[1].unit, "revs/min");
        assert_eq!(map[2].value, Value::Bool(false));
        Ok(())
    }

    #[test]
    fn array_variables_decode_all_elements() -> Result<()> {
        let mut frame1 = Vec::new();
        let mut frame2 = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            frame1.extend_from_slice(&v.to_le_bytes());
        }
        for v in [5.0f32, 6.0, 7.0, 8.0] {
            frame2.extend_from_slice(&v.to_le_bytes());
        }
        let image = FixtureBuilder::new()
            .var("T", 4, 0, 4)
            .buf_len(16)
            .frame(frame1)
            .frame(frame2)
            .build();
        let mut telemetry = open(image);
        let mut iter = telemetry.samples(CancellationToken::new());

        let expected = [[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        for row in expected {
            let view = iter.next_sample()?.unwrap();
            let value = view.get("T").unwrap().value;
            let items = value.as_array().unwrap();
            let floats: Vec<f32> = items.iter().map(|v| v.as_f32().unwrap()).collect();
            assert_eq!(floats, row);
        }
        assert!(iter.next_sample()?.is_none());
        Ok(())
    }

    #[test]
    fn char_variables_decode_as_strings() -> Result<()> {
        let mut frame = b"P2\0\0".to_vec();
        frame.push(b'N');
        let image = FixtureBuilder::new()
            .var("DisplayUnits", 0, 0, 4)
            .var("GearChar", 0, 4, 1)
            .buf_len(5)
            .frame(frame)
            .build();
        let mut telemetry = open(image);
        let mut iter = telemetry.samples(CancellationToken::new());
        let view = iter.next_sample()?.unwrap();

        assert_eq!(view.get("DisplayUnits").unwrap().value, Value::String("P2".into()));
        assert_eq!(view.get("GearChar").unwrap().value, Value::String("N".into()));
        Ok(())
    }

    #[test]
    fn scalar_char_nul_is_an_empty_string() -> Result<()> {
        let image = FixtureBuilder::new()
            .var("GearChar", 0, 0, 1)
            .buf_len(1)
            .frame(vec![0])
            .build();
        let mut telemetry = open(image);
        let mut iter = telemetry.samples(CancellationToken::new());
        let view = iter.next_sample()?.unwrap();
        assert_eq!(view.get("GearChar").unwrap().value, Value::String(String::new()));
        Ok(())
    }

    #[test]
    fn bitfield_values_stay_raw() -> Result<()> {
        let image = FixtureBuilder::new()
            .var("SessionFlags", 3, 0, 1)
            .buf_len(4)
            .frame(0xDEAD_BEEFu32.to_le_bytes().to_vec())
            .build();
        let mut telemetry = open(image);
        let mut iter = telemetry.samples(CancellationToken::new());
        let view = iter.next_sample()?.unwrap();
        assert_eq!(view.get("SessionFlags").unwrap().value.as_u32(), Some(0xDEAD_BEEF));
        Ok(())
    }

    #[test]
    fn cancellation_stops_the_stream_and_frees_the_handle() -> Result<()> {
        let mut telemetry = mixed_fixture(1000);
        let cancel = CancellationToken::new();

        {
            let mut iter = telemetry.samples(cancel.clone());
            for _ in 0..10 {
                iter.next_sample()?.expect("frames remain before cancellation");
            }
            assert_eq!(iter.next_index(), 10);
            cancel.cancel();
            let err = iter.next_sample().unwrap_err();
            assert!(err.is_cancelled());
            assert!(iter.next_sample()?.is_none());
        }

        // A fresh iterator starts over at frame 0.
        let mut iter = telemetry.samples(CancellationToken::new());
        let first = iter.next_sample()?.unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(first.get("RPM").unwrap().value.as_i32(), Some(5000));
        Ok(())
    }

    #[test]
    fn truncated_mid_frame_fails_at_the_incomplete_frame() -> Result<()> {
        let mut image = FixtureBuilder::new()
            .var("Tick", 2, 0, 1)
            .buf_len(4)
            .frame(0i32.to_le_bytes().to_vec())
            .frame(1i32.to_le_bytes().to_vec())
            .frame(2i32.to_le_bytes().to_vec())
            .build();
        image.truncate(image.len() - 2); // cut the last frame in half

        let mut telemetry = Telemetry::from_source(
            Cursor::new(image),
            PathBuf::from("<memory>"),
            OpenOptions::default(),
        )?;
        let mut iter = telemetry.samples(CancellationToken::new());

        assert_eq!(iter.next_sample()?.unwrap().index(), 0);
        assert_eq!(iter.next_sample()?.unwrap().index(), 1);
        let err = iter.next_sample().unwrap_err();
        ensure!(
            matches!(err, TelemetryError::Truncated { needed: 4, .. }),
            "expected Truncated at third frame, got {err:?}"
        );
        assert!(iter.next_sample()?.is_none());
        Ok(())
    }

    #[test]
    fn sample_at_matches_streamed_frames() -> Result<()> {
        let mut telemetry = mixed_fixture(12);
        let cancel = CancellationToken::new();

        let mut streamed = Vec::new();
        {
            let mut iter = telemetry.samples(cancel.clone());
            while let Some(view) = iter.next_sample()? {
                streamed.push((
                    view.get("Speed").unwrap().value,
                    view.get("RPM").unwrap().value,
                    view.get("OnTrack").unwrap().value,
                ));
            }
        }

        for (k, expected) in streamed.iter().enumerate() {
            let view = telemetry.sample_at(k, &cancel)?;
            assert_eq!(view.get("Speed").unwrap().value, expected.0);
            assert_eq!(view.get("RPM").unwrap().value, expected.1);
            assert_eq!(view.get("OnTrack").unwrap().value, expected.2);
        }
        Ok(())
    }
}
