#![forbid(unsafe_code)]

//! Base64 as it appears in signature documents.

use base64::Engine;
use lindholmen_core::{Error, Result};

/// Decode base64 text, ignoring the whitespace and line breaks that XML
/// pretty-printing leaves inside element content.
pub fn decode_base64_lenient(text: &str) -> Result<Vec<u8>> {
    let engine = base64::engine::general_purpose::STANDARD;
    let clean: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    engine
        .decode(clean.as_bytes())
        .map_err(|e| Error::Base64(e.to_string()))
}

/// Encode bytes as standard base64 without line breaks.
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}
