//! Session metadata parsing and the derived session identifier
//!
//! Session info varies across iRacing releases, so it is kept as a loose
//! string-keyed tree ([`serde_yaml_ng::Value`]) rather than typed records.
//! Callers needing specific fields perform their own lookup-and-cast. The
//! one derived field the crate itself consumes is the session identifier
//! `"{SubSessionID}-{SessionID}"` taken from the top-level `WeekendInfo` map.

use std::io::{Read, Seek};

use serde_yaml_ng::Value;
use tracing::warn;

use crate::ibt::format::FileHeader;
use crate::ibt::{OpenOptions, SessionInfoPolicy};
use crate::yaml_utils;
use crate::{Result, TelemetryError};

/// Extract and parse the session-info blob according to the open policy.
///
/// With [`SessionInfoPolicy::Empty`], a malformed blob degrades to
/// `Value::Null` instead of failing the open.
pub(crate) fn load_session_info<R: Read + Seek>(
    reader: &mut R,
    header: &FileHeader,
    options: &OpenOptions,
) -> Result<Value> {
    match parse_session_info(reader, header) {
        Ok(tree) => Ok(tree),
        Err(err @ TelemetryError::SessionInfoMalformed { .. }) => {
            match options.on_session_info_error {
                SessionInfoPolicy::Fail => Err(err),
                SessionInfoPolicy::Empty => {
                    warn!("session info unusable, continuing with empty tree: {err}");
                    Ok(Value::Null)
                }
            }
        }
        Err(err) => Err(err),
    }
}

fn parse_session_info<R: Read + Seek>(reader: &mut R, header: &FileHeader) -> Result<Value> {
    let len = header.session_info_len.max(0) as usize;
    let blob = yaml_utils::read_session_blob(reader, header.session_info_offset as u64, len)?;
    if blob.trim().is_empty() {
        return Ok(Value::Null);
    }

    let cleaned = yaml_utils::strip_control_characters(&blob);
    serde_yaml_ng::from_str(&cleaned)
        .map_err(|e| TelemetryError::SessionInfoMalformed { details: e.to_string() })
}

/// Derive the stable session identifier `"{SubSessionID}-{SessionID}"`.
///
/// Either side renders empty when the key is missing, so a file without
/// `WeekendInfo` yields `"-"`.
pub(crate) fn derive_session_id(info: &Value) -> String {
    let sub = weekend_field(info, "SubSessionID");
    let sess = weekend_field(info, "SessionID");
    format!("{sub}-{sess}")
}

fn weekend_field(info: &Value, key: &str) -> String {
    let Some(root) = info.as_mapping() else { return String::new() };
    let weekend_key = Value::String("WeekendInfo".to_string());
    let Some(weekend) = root.get(&weekend_key).and_then(Value::as_mapping) else {
        return String::new();
    };
    match weekend.get(&Value::String(key.to_string())) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
