//! Synthetic IBT fixtures for tests and benches
//!
//! Builds complete in-memory `.ibt` byte images: file header, disk
//! sub-header, session YAML, variable headers, and sample frames. Region
//! offsets are computed the way the simulator lays files out (YAML first,
//! then variable headers, then frames), but decoding only ever trusts the
//! offsets written into the header.

const FILE_HEADER_SIZE: usize = 112;
const DISK_SUBHEADER_SIZE: usize = 32;
const VAR_HEADER_SIZE: usize = 144;

struct VarSpec {
    name: String,
    tag: i32,
    offset: i32,
    count: i32,
    count_as_time: bool,
    unit: String,
    description: String,
}

/// Builder for synthetic IBT byte images.
///
/// Defaults: version 2, 60 Hz tick rate, no session YAML, no variables, no
/// frames. `build` panics on malformed fixtures (frames not matching
/// `buf_len`), since that is a bug in the test itself.
pub struct FixtureBuilder {
    version: i32,
    status: i32,
    tick_rate: i32,
    session_info_update: i32,
    session_yaml: String,
    session_nul_padding: usize,
    vars: Vec<VarSpec>,
    buf_len: i32,
    frames: Vec<Vec<u8>>,
    start_date: f32,
    start_time: f64,
    end_time: f64,
    lap_count: i32,
    record_count: Option<i32>,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            version: 2,
            status: 1,
            tick_rate: 60,
            session_info_update: 0,
            session_yaml: String::new(),
            session_nul_padding: 0,
            vars: Vec::new(),
            buf_len: 0,
            frames: Vec::new(),
            start_date: 0.0,
            start_time: 0.0,
            end_time: 0.0,
            lap_count: 0,
            record_count: None,
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn tick_rate(mut self, tick_rate: i32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn session_info_update(mut self, revision: i32) -> Self {
        self.session_info_update = revision;
        self
    }

    pub fn session_yaml(mut self, yaml: &str) -> Self {
        self.session_yaml = yaml.to_string();
        self
    }

    /// Append NUL padding to the session blob, counted in its declared
    /// length, to exercise the decoder's right-trim.
    pub fn session_nul_padding(mut self, padding: usize) -> Self {
        self.session_nul_padding = padding;
        self
    }

    /// Add a variable header with empty unit and description. `tag` is the
    /// raw on-disk type tag, so tests can write invalid ones.
    pub fn var(self, name: &str, tag: i32, offset: i32, count: i32) -> Self {
        self.var_full(name, tag, offset, count, false, "", "")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn var_full(
        mut self,
        name: &str,
        tag: i32,
        offset: i32,
        count: i32,
        count_as_time: bool,
        unit: &str,
        description: &str,
    ) -> Self {
        self.vars.push(VarSpec {
            name: name.to_string(),
            tag,
            offset,
            count,
            count_as_time,
            unit: unit.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn buf_len(mut self, buf_len: i32) -> Self {
        self.buf_len = buf_len;
        self
    }

    pub fn frame(mut self, frame: Vec<u8>) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn start_date(mut self, start_date: f32) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn end_time(mut self, end_time: f64) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn lap_count(mut self, lap_count: i32) -> Self {
        self.lap_count = lap_count;
        self
    }

    /// Override the disk sub-header's record count (defaults to the number
    /// of frames added).
    pub fn record_count(mut self, record_count: i32) -> Self {
        self.record_count = Some(record_count);
        self
    }

    pub fn build(self) -> Vec<u8> {
        for (i, frame) in self.frames.iter().enumerate() {
            assert_eq!(
                frame.len(),
                self.buf_len as usize,
                "fixture frame {i} must be exactly buf_len bytes"
            );
        }

        let session_bytes = self.session_yaml.as_bytes();
        let session_len = session_bytes.len() + self.session_nul_padding;
        let session_offset = FILE_HEADER_SIZE + DISK_SUBHEADER_SIZE;
        let var_header_offset = session_offset + session_len;
        let buf_offset = var_header_offset + self.vars.len() * VAR_HEADER_SIZE;

        let mut image = Vec::with_capacity(buf_offset + self.frames.len() * self.buf_len as usize);

        // File header: 28 little-endian int32 slots.
        let mut slots = [0i32; 28];
        slots[0] = self.version;
        slots[1] = self.status;
        slots[2] = self.tick_rate;
        slots[3] = self.session_info_update;
        slots[4] = session_len as i32;
        slots[5] = session_offset as i32;
        slots[6] = self.vars.len() as i32;
        slots[7] = var_header_offset as i32;
        slots[8] = self.frames.len() as i32;
        slots[9] = self.buf_len;
        slots[13] = buf_offset as i32;
        for slot in slots {
            image.extend_from_slice(&slot.to_le_bytes());
        }

        // Disk sub-header with 4 bytes of tail padding.
        image.extend_from_slice(&self.start_date.to_le_bytes());
        image.extend_from_slice(&self.start_time.to_le_bytes());
        image.extend_from_slice(&self.end_time.to_le_bytes());
        image.extend_from_slice(&self.lap_count.to_le_bytes());
        let record_count = self.record_count.unwrap_or(self.frames.len() as i32);
        image.extend_from_slice(&record_count.to_le_bytes());
        image.extend_from_slice(&[0u8; 4]);

        // Session YAML, NUL-padded to its declared length.
        image.extend_from_slice(session_bytes);
        image.resize(session_offset + session_len, 0);

        // Variable headers.
        for var in &self.vars {
            let mut header = [0u8; VAR_HEADER_SIZE];
            header[0..4].copy_from_slice(&var.tag.to_le_bytes());
            header[4..8].copy_from_slice(&var.offset.to_le_bytes());
            header[8..12].copy_from_slice(&var.count.to_le_bytes());
            header[12] = var.count_as_time as u8;
            write_fixed(&mut header[16..48], var.name.as_bytes());
            write_fixed(&mut header[48..112], var.description.as_bytes());
            write_fixed(&mut header[112..144], var.unit.as_bytes());
            image.extend_from_slice(&header);
        }

        // Sample frames.
        for frame in &self.frames {
            image.extend_from_slice(frame);
        }

        image
    }
}

fn write_fixed(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value[..len]);
}

/// Frame helper: concatenate little-endian f32 values.
pub fn f32_frame(values: &[f32]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(values.len() * 4);
    for v in values {
        frame.extend_from_slice(&v.to_le_bytes());
    }
    frame
}
