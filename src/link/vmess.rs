//! `vmess://` + base64(JSON) links

use serde::Serialize;
use serde_json::{Map, Value};

use super::b64;
use super::records::Vmess;

pub const SCHEME_PREFIX: &str = "vmess://";

/// Canonical wire object. Field order is the serialization order.
#[derive(Serialize)]
struct VmessJson<'a> {
    v: &'a str,
    ps: &'a str,
    add: &'a str,
    port: String,
    id: &'a str,
    aid: String,
    net: &'a str,
    #[serde(rename = "type")]
    header_type: &'a str,
    host: &'a str,
    path: &'a str,
    tls: &'a str,
    sni: &'a str,
    cipher: &'a str,
}

pub fn encode(record: &Vmess) -> String {
    let wire = VmessJson {
        v: "2",
        ps: &record.name,
        add: &record.server,
        port: record.port.to_string(),
        id: &record.uuid,
        aid: record.alter_id.to_string(),
        net: &record.network,
        header_type: &record.header_type,
        host: &record.host,
        path: &record.path,
        tls: if record.tls { "tls" } else { "" },
        sni: &record.sni,
        cipher: &record.cipher,
    };
    // Serializing a struct of strings cannot fail.
    let json = serde_json::to_string(&wire).unwrap_or_default();
    format!("{}{}", SCHEME_PREFIX, b64::encode(json))
}

pub fn decode(link: &str) -> Option<Vmess> {
    let obj = decode_object(link)?;

    let server = string_field(&obj, "add").filter(|s| !s.is_empty())?;
    let port = string_field(&obj, "port")?.trim().parse().ok()?;
    let alter_id = string_field(&obj, "aid")
        .or_else(|| string_field(&obj, "alterid"))
        .or_else(|| string_field(&obj, "alterId"))
        .and_then(|aid| aid.trim().parse().ok())
        .unwrap_or(0);
    let tls = match obj.get("tls") {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(s)) => s == "tls",
        _ => false,
    };

    Some(Vmess {
        name: string_field(&obj, "ps").unwrap_or_default(),
        server,
        port,
        uuid: string_field(&obj, "id").unwrap_or_default(),
        alter_id,
        network: string_field(&obj, "net").unwrap_or_else(|| "tcp".to_string()),
        header_type: string_field(&obj, "type").unwrap_or_else(|| "none".to_string()),
        host: string_field(&obj, "host").unwrap_or_default(),
        path: string_field(&obj, "path").unwrap_or_default(),
        tls,
        sni: string_field(&obj, "sni").unwrap_or_default(),
        cipher: string_field(&obj, "cipher")
            .or_else(|| string_field(&obj, "scy"))
            .unwrap_or_else(|| "auto".to_string()),
    })
}

/// Rewrite the embedded `ps` name, keeping every other key and its order.
///
/// Returns `None` when the payload is not a base64 JSON object.
pub fn prepend_name(link: &str, prefix: &str) -> Option<String> {
    let mut obj = decode_object(link)?;
    let original = string_field(&obj, "ps").unwrap_or_default();
    if original.starts_with(prefix) {
        return Some(link.to_string());
    }
    obj.insert("ps".to_string(), Value::String(super::prefixed_name(prefix, &original)));
    Some(reencode(&obj))
}

/// Re-serialize the payload as compact JSON so equivalent links compare equal.
pub fn normalize(link: &str) -> Option<String> {
    decode_object(link).map(|obj| reencode(&obj))
}

fn decode_object(link: &str) -> Option<Map<String, Value>> {
    let payload = link.strip_prefix(SCHEME_PREFIX)?;
    let bytes = b64::decode(payload)?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(obj) => Some(obj),
        _ => None,
    }
}

fn reencode(obj: &Map<String, Value>) -> String {
    let json = serde_json::to_string(obj).unwrap_or_default();
    format!("{}{}", SCHEME_PREFIX, b64::encode(json))
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
