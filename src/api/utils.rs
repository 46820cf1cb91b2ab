//! API utility functions
//!
//! Pure helpers for the subscription handler, kept apart so they can be
//! unit tested without a router.

use axum::http::{HeaderMap, header};

use crate::link::uri::encode_component;

/// Paths that look like a static file (`/favicon.ico`, `/assets/app.js`).
/// These never name a token.
pub fn is_static_asset(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Externally reachable base URL of this service: the configured public URL,
/// else scheme from `X-Forwarded-Proto` (default `http`) plus `Host`.
pub fn base_url(headers: &HeaderMap, public_url: Option<&str>) -> String {
    if let Some(url) = public_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

/// `attachment; filename*=utf-8''<percent-encoded name>`
pub fn content_disposition(file_name: &str) -> String {
    format!("attachment; filename*=utf-8''{}", encode_component(file_name))
}
