//! Shared parsing/formatting for `scheme://userinfo@host:port?query#fragment` links

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::form_urlencoded;

/// Characters escaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Strict percent-decoding; `None` when the result is not UTF-8.
pub fn decode_component(value: &str) -> Option<String> {
    percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(|cow| cow.into_owned())
}

pub fn decode_component_lossy(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Split a link at its last `#`.
pub fn split_fragment(link: &str) -> (&str, Option<&str>) {
    match link.rfind('#') {
        Some(idx) => (&link[..idx], Some(&link[idx + 1..])),
        None => (link, None),
    }
}

/// A link broken into its raw components. User-info and fragment are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriParts {
    pub userinfo: String,
    pub host: String,
    pub port: u16,
    pub query: Vec<(String, String)>,
    pub fragment: Option<String>,
}

impl UriParts {
    pub fn parse(link: &str) -> Option<Self> {
        let (_, rest) = link.split_once("://")?;
        let (rest, fragment) = split_fragment(rest);
        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, query),
            None => (rest, ""),
        };
        let authority = authority.trim_end_matches('/');
        let (userinfo, hostport) = authority.rsplit_once('@')?;
        let (host, port) = split_host_port(hostport)?;

        Some(Self {
            userinfo: decode_component(userinfo)?,
            host,
            port,
            query: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            fragment: fragment.map(decode_component_lossy),
        })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty query parameter as an owned string.
    pub fn param_owned(&self, key: &str) -> Option<String> {
        self.param(key).filter(|v| !v.is_empty()).map(str::to_string)
    }
}

fn split_host_port(hostport: &str) -> Option<(String, u16)> {
    let (host, port) = if let Some(rest) = hostport.strip_prefix('[') {
        let (host, port) = rest.split_once("]:")?;
        (host, port)
    } else {
        hostport.rsplit_once(':')?
    };
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}

/// Format `host:port`, bracketing IPv6 literals.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Serialize `(key, value)` pairs as a query string, skipping `None` values.
pub fn query_string(pairs: &[(&str, Option<&str>)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

/// Assemble a canonical link from encoded pieces.
pub fn assemble(
    scheme: &str,
    userinfo: &str,
    host: &str,
    port: u16,
    query: &str,
    name: Option<&str>,
) -> String {
    let mut link = format!("{}://{}@{}", scheme, userinfo, host_port(host, port));
    if !query.is_empty() {
        link.push('?');
        link.push_str(query);
    }
    if let Some(name) = name {
        link.push('#');
        link.push_str(&encode_component(name));
    }
    link
}
