//! Inline `data:<mime>;base64,<payload>` encoding for file submissions.

use data_encoding::BASE64;
use std::path::Path;

const PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, thiserror::Error)]
pub enum DataUrlError {
    #[error("not a data url")]
    MissingPrefix,

    #[error("data url is not base64-encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    Payload(#[from] data_encoding::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("{}{}{}{}", PREFIX, mime, BASE64_MARKER, BASE64.encode(bytes))
}

/// Guess a media type from the file extension.
pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub fn decode(s: &str) -> Result<DataUrl, DataUrlError> {
    let rest = s.strip_prefix(PREFIX).ok_or(DataUrlError::MissingPrefix)?;
    let (mime, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or(DataUrlError::NotBase64)?;
    Ok(DataUrl {
        mime: mime.to_string(),
        bytes: BASE64.decode(payload.as_bytes())?,
    })
}

pub fn is_data_url(s: &str) -> bool {
    s.starts_with(PREFIX)
}
