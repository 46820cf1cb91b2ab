//! Lenient base64 helpers shared by the codec and the feed classifier

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

/// Encode bytes with the standard padded alphabet (the canonical form).
pub fn encode(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}

/// Decode base64 accepting padded/unpadded and standard/url-safe input.
///
/// Whitespace is stripped first, since feeds frequently wrap their payload.
pub fn decode(input: &str) -> Option<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(cleaned.as_bytes()).ok())
}

/// Decode base64 into UTF-8 text, replacing invalid sequences.
pub fn decode_text(input: &str) -> Option<String> {
    decode(input).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
