//! Payload classification for fetched subscription bodies
//!
//! A body is one of three things: a structured rule-based config (Clash
//! YAML), a base64 blob wrapping a link list, or a plain newline-delimited
//! link list. The structured check ANDs three predicates in a fixed order:
//! marker present, not a base64 blob, structural character present.

/// Top-level keys that mark a structured config.
pub const STRUCTURED_MARKERS: &[&str] = &[
    "proxies:",
    "proxy-providers:",
    "proxy-groups:",
    "rules:",
    "dns:",
    "port:",
    "socks-port:",
    "allow-lan:",
    "mode:",
    "log-level:",
    "external-controller:",
];

const BLOB_MIN_LEN: usize = 100;
const FEED_BASE64_MIN_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Structured,
    Base64,
    LineList,
}

pub fn has_structured_marker(text: &str) -> bool {
    STRUCTURED_MARKERS.iter().any(|marker| text.contains(marker))
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_whitespace()
}

/// Strict blob test used to veto structured detection.
pub fn is_base64_blob(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(is_base64_char)
        && trimmed.len() > BLOB_MIN_LEN
        && !text.contains([':', '-', '{', '}'])
}

pub fn has_structural_char(text: &str) -> bool {
    text.contains(':') || text.contains("- ")
}

pub fn is_structured(text: &str) -> bool {
    has_structured_marker(text) && !is_base64_blob(text) && has_structural_char(text)
}

/// Looser test for feed bodies: whitespace-stripped, base64 alphabet only.
pub fn looks_like_base64(text: &str) -> bool {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    stripped.len() > FEED_BASE64_MIN_LEN && stripped.chars().all(is_base64_char)
}

pub fn classify(text: &str) -> PayloadKind {
    if is_structured(text) {
        PayloadKind::Structured
    } else if is_base64_blob(text) || looks_like_base64(text) {
        PayloadKind::Base64
    } else {
        PayloadKind::LineList
    }
}
