//! Callback tokens
//!
//! When a request is delegated to the external converter, the converter is
//! pointed back at this service with a `callback_token`. A request carrying
//! the right token is the converter fetching raw nodes, so it is answered
//! directly instead of being delegated again.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::negotiate::Target;
use crate::link::uri::encode_component;

type HmacSha256 = Hmac<Sha256>;

const SIGNED_MESSAGE: &[u8] = b"callback-static-data";
const TOKEN_LEN: usize = 16;

/// First 16 hex chars of HMAC-SHA256(secret, fixed message). Deterministic
/// per secret.
pub fn callback_token(secret: &str) -> String {
    // HMAC accepts any key length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(SIGNED_MESSAGE);
    let digest = hex::encode(mac.finalize().into_bytes());
    digest[..TOKEN_LEN].to_string()
}

pub fn is_valid(secret: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|token| token == callback_token(secret))
}

/// URL the converter fetches to obtain the raw node list.
pub fn callback_url(base_url: &str, token: &str, profile: Option<&str>, callback: &str) -> String {
    let mut url = format!("{}/{}", base_url.trim_end_matches('/'), encode_component(token));
    if let Some(profile) = profile {
        url.push('/');
        url.push_str(&encode_component(profile));
    }
    format!("{}?target={}&callback_token={}", url, Target::Base64, callback)
}
