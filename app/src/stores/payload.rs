//! Inline (base64 / data URL) payloads exchanged with the engine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::clients::EngineError;

/// Split `data:<mime>;base64,<data>` into its mime type and data.
/// Anything without the prefix is returned as bare data.
pub fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    let Some(rest) = payload.strip_prefix("data:") else {
        return (None, payload);
    };
    match rest.split_once(',') {
        Some((header, data)) => {
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            (Some(mime).filter(|m| !m.is_empty()), data)
        }
        None => (None, payload),
    }
}

/// Decode a bare base64 string or a base64 data URL.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, EngineError> {
    let (_, data) = split_data_url(payload);
    STANDARD
        .decode(data.trim())
        .map_err(|e| EngineError::Decode(e.to_string()))
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
