use serde_json::{Map, Value};

use super::{ProtocolError, Result};

/// Parse one reply line into its top-level fields.
///
/// Only checks that the line is a JSON object; which fields must be present
/// is up to the [`Correlator`](super::Correlator). Bytes that are not valid
/// UTF-8 make the line malformed.
pub fn decode_response(line: impl AsRef<[u8]>) -> Result<Map<String, Value>> {
    let trimmed = trim_whitespace(line.as_ref());
    if trimmed.is_empty() {
        return Err(ProtocolError::MalformedResponse("empty line".to_string()));
    }

    let value: Value = serde_json::from_slice(trimmed).map_err(|e| {
        ProtocolError::MalformedResponse(format!("{}: {:?}", e, String::from_utf8_lossy(trimmed)))
    })?;

    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(ProtocolError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
