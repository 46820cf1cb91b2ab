//! Clash YAML -> canonical links
//!
//! Each entry under `proxies` becomes one link. Entries under
//! `proxy-providers` are fetched, concurrently, and their contents appended
//! after the inline proxies in declaration order. Provider expansion is capped
//! at one level: a provider that itself declares providers only contributes
//! its inline proxies.

use futures::future::join_all;
use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{self, PayloadKind};
use crate::fetch::{SourceFetcher, fetch_with_timeout};
use crate::link::{
    self, Hysteria, ProxyRecord, Shadowsocks, ShadowsocksR, Trojan, Tuic, Vless, Vmess, b64,
};

/// Deepest level at which `proxy-providers` are still fetched.
pub const MAX_PROVIDER_DEPTH: u8 = 1;

const DEFAULT_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("proxy entry is not a mapping")]
    NotAMapping,

    #[error("document root is not a mapping")]
    NotADocument,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unsupported proxy type `{0}`")]
    UnsupportedType(String),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// The two sections of a Clash document the bridge reads. A section of the
/// wrong shape is skipped so the rest of the document still counts.
#[derive(Debug, Default)]
struct ClashDocument {
    proxies: Vec<YamlValue>,
    providers: Mapping,
}

impl ClashDocument {
    /// Parse with YAML merge keys (`<<: *anchor`) resolved.
    fn parse(text: &str) -> Result<Self> {
        let mut value: YamlValue = serde_yaml::from_str(text)?;
        value.apply_merge()?;

        let root = match value {
            YamlValue::Mapping(root) => root,
            YamlValue::Null => return Ok(Self::default()),
            _ => return Err(BridgeError::NotADocument),
        };

        let proxies = match root.get("proxies") {
            None | Some(YamlValue::Null) => Vec::new(),
            Some(YamlValue::Sequence(entries)) => entries.clone(),
            Some(_) => {
                warn!("`proxies` is not a sequence, ignoring it");
                Vec::new()
            }
        };
        let providers = match root.get("proxy-providers") {
            None | Some(YamlValue::Null) => Mapping::new(),
            Some(YamlValue::Mapping(providers)) => providers.clone(),
            Some(_) => {
                warn!("`proxy-providers` is not a mapping, ignoring it");
                Mapping::new()
            }
        };

        Ok(Self { proxies, providers })
    }

    fn proxies(&self) -> &[YamlValue] {
        &self.proxies
    }

    /// `(name, spec)` pairs in declaration order. Entries that do not parse
    /// or carry no url are skipped.
    fn providers(&self) -> Vec<(String, ProviderSpec)> {
        self.providers
            .iter()
            .filter_map(|(name, spec)| {
                let name = value_to_string(name)?;
                match serde_yaml::from_value::<ProviderSpec>(spec.clone()) {
                    Ok(spec) if spec.url.as_deref().is_some_and(|u| !u.trim().is_empty()) => {
                        Some((name, spec))
                    }
                    Ok(_) => {
                        debug!(provider = %name, "provider without url skipped");
                        None
                    }
                    Err(e) => {
                        warn!(provider = %name, error = %e, "unreadable provider entry");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderSpec {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "override")]
    overrides: Option<ProviderOverride>,
}

impl ProviderSpec {
    fn prefix(&self) -> Option<&str> {
        self.overrides
            .as_ref()
            .and_then(|o| o.additional_prefix.as_deref())
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderOverride {
    #[serde(default, rename = "additional-prefix")]
    additional_prefix: Option<String>,
}

/// Convert one `proxies` entry into a record.
pub fn record_from_clash(entry: &YamlValue) -> Result<ProxyRecord> {
    let map = entry.as_mapping().ok_or(BridgeError::NotAMapping)?;

    let kind = string_field(map, "type")
        .filter(|t| !t.is_empty())
        .ok_or(BridgeError::MissingField("type"))?
        .to_ascii_lowercase();
    let server = string_field(map, "server")
        .filter(|s| !s.is_empty())
        .ok_or(BridgeError::MissingField("server"))?;
    let port = u16_field(map, "port")
        .filter(|p| *p != 0)
        .ok_or(BridgeError::MissingField("port"))?;
    let name = string_field(map, "name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    let record = match kind.as_str() {
        "ss" => ProxyRecord::Shadowsocks(Shadowsocks {
            name,
            server,
            port,
            cipher: string_field(map, "cipher").unwrap_or_else(|| "aes-256-gcm".to_string()),
            password: string_field(map, "password").unwrap_or_default(),
        }),
        "ssr" => ProxyRecord::ShadowsocksR(ShadowsocksR {
            name,
            server,
            port,
            cipher: string_field(map, "cipher").unwrap_or_else(|| "aes-256-cfb".to_string()),
            password: string_field(map, "password").unwrap_or_default(),
            protocol: string_field(map, "protocol").unwrap_or_else(|| "origin".to_string()),
            obfs: string_field(map, "obfs").unwrap_or_else(|| "plain".to_string()),
        }),
        "vmess" => ProxyRecord::Vmess(Vmess {
            name,
            server,
            port,
            uuid: string_field(map, "uuid").unwrap_or_default(),
            alter_id: first_string(map, &["alterId", "alterid"])
                .and_then(|aid| aid.trim().parse().ok())
                .unwrap_or(0),
            network: string_field(map, "network").unwrap_or_else(|| "tcp".to_string()),
            header_type: "none".to_string(),
            host: transport_host(map).unwrap_or_default(),
            path: transport_path(map).unwrap_or_default(),
            tls: bool_field(map, "tls").unwrap_or(false),
            sni: first_string(map, &["servername", "sni"]).unwrap_or_default(),
            cipher: string_field(map, "cipher").unwrap_or_else(|| "auto".to_string()),
        }),
        "vless" => ProxyRecord::Vless(Vless {
            name,
            server,
            port,
            uuid: string_field(map, "uuid").unwrap_or_default(),
            network: string_field(map, "network"),
            security: string_field(map, "security").or_else(|| {
                bool_field(map, "tls")
                    .filter(|tls| *tls)
                    .map(|_| "tls".to_string())
            }),
            sni: first_string(map, &["servername", "sni"]),
            host: transport_host(map),
            path: transport_path(map),
        }),
        "trojan" => ProxyRecord::Trojan(Trojan {
            name,
            server,
            port,
            password: string_field(map, "password").unwrap_or_default(),
            sni: first_string(map, &["sni", "servername"]),
            alpn: alpn_field(map),
        }),
        "hysteria" | "hy" | "hysteria2" | "hy2" => {
            let record = Hysteria {
                name,
                server,
                port,
                auth: first_string(map, &["auth", "auth-str", "auth_str", "password"])
                    .unwrap_or_default(),
                sni: first_string(map, &["sni", "servername"]),
                alpn: alpn_field(map),
            };
            if kind.ends_with('2') {
                ProxyRecord::Hysteria2(record)
            } else {
                ProxyRecord::Hysteria(record)
            }
        }
        "tuic" => ProxyRecord::Tuic(Tuic {
            name,
            server,
            port,
            uuid: string_field(map, "uuid").unwrap_or_default(),
            password: string_field(map, "password").unwrap_or_default(),
            sni: first_string(map, &["sni", "servername"]),
            alpn: alpn_field(map),
        }),
        _ => return Err(BridgeError::UnsupportedType(kind)),
    };

    Ok(record)
}

/// Encode every convertible entry; the rest are logged and dropped.
pub fn links_from_entries(entries: &[YamlValue]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| match record_from_clash(entry) {
            Ok(record) => Some(link::encode(&record)),
            Err(e) => {
                debug!(error = %e, "proxy entry dropped");
                None
            }
        })
        .collect()
}

/// Expands structured documents, fetching providers through `fetcher`.
pub struct Bridge<'a> {
    fetcher: &'a dyn SourceFetcher,
    timeout: Duration,
}

impl<'a> Bridge<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Links for a top-level document: inline proxies first, then each
    /// provider's links in declaration order.
    ///
    /// Fails only when the document itself is not valid YAML.
    pub async fn expand(&self, text: &str, user_agent: &str) -> Result<Vec<String>> {
        let doc = ClashDocument::parse(text)?;
        let mut links = links_from_entries(doc.proxies());

        let providers = doc.providers();
        if !providers.is_empty() {
            links.extend(self.expand_providers(&providers, user_agent, 1).await);
        }

        Ok(links)
    }

    async fn expand_providers(
        &self,
        providers: &[(String, ProviderSpec)],
        user_agent: &str,
        depth: u8,
    ) -> Vec<String> {
        if depth > MAX_PROVIDER_DEPTH {
            return Vec::new();
        }

        let fetches = providers
            .iter()
            .map(|(name, spec)| self.expand_provider(name, spec, user_agent, depth));
        join_all(fetches).await.into_iter().flatten().collect()
    }

    async fn expand_provider(
        &self,
        name: &str,
        spec: &ProviderSpec,
        user_agent: &str,
        depth: u8,
    ) -> Vec<String> {
        let url = spec.url.as_deref().unwrap_or_default();
        let body = match fetch_with_timeout(self.fetcher, url, user_agent, self.timeout).await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = %name, url, error = %e, "provider fetch failed");
                return Vec::new();
            }
        };

        let links = provider_links(name, &body, depth);
        debug!(provider = %name, count = links.len(), "provider expanded");

        match spec.prefix() {
            Some(prefix) => links.iter().map(|l| link::prepend_name(l, prefix)).collect(),
            None => links,
        }
    }
}

/// Links inside a fetched provider body at `depth`.
fn provider_links(name: &str, body: &str, depth: u8) -> Vec<String> {
    let decoded = match classify::classify(body) {
        PayloadKind::Base64 => b64::decode_text(body),
        _ => None,
    };
    let text = decoded.as_deref().unwrap_or(body);

    if classify::is_structured(text) {
        return match ClashDocument::parse(text) {
            Ok(doc) => {
                if depth >= MAX_PROVIDER_DEPTH && !doc.providers().is_empty() {
                    debug!(provider = %name, "nested proxy-providers not expanded");
                }
                links_from_entries(doc.proxies())
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "provider YAML unreadable");
                Vec::new()
            }
        };
    }

    text.lines()
        .map(str::trim)
        .filter(|line| link::has_known_scheme(line))
        .map(str::to_string)
        .collect()
}

fn string_field(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(value_to_string)
}

fn first_string(map: &Mapping, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| string_field(map, key))
        .filter(|v| !v.is_empty())
}

fn u16_field(map: &Mapping, key: &str) -> Option<u16> {
    map.get(key).and_then(|v| match v {
        YamlValue::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        YamlValue::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    })
}

fn bool_field(map: &Mapping, key: &str) -> Option<bool> {
    map.get(key).and_then(|v| match v {
        YamlValue::Bool(b) => Some(*b),
        YamlValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        YamlValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    })
}

fn value_to_string(v: &YamlValue) -> Option<String> {
    match v {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `alpn` as either a sequence or a comma-separated string.
fn alpn_field(map: &Mapping) -> Option<String> {
    match map.get("alpn")? {
        YamlValue::Sequence(items) => {
            let joined = items
                .iter()
                .filter_map(value_to_string)
                .collect::<Vec<_>>()
                .join(",");
            (!joined.is_empty()).then_some(joined)
        }
        other => value_to_string(other).filter(|s| !s.is_empty()),
    }
}

fn ws_opts(map: &Mapping) -> Option<&Mapping> {
    map.get("ws-opts").and_then(YamlValue::as_mapping)
}

fn transport_path(map: &Mapping) -> Option<String> {
    string_field(map, "path")
        .or_else(|| ws_opts(map).and_then(|ws| string_field(ws, "path")))
        .filter(|p| !p.is_empty())
}

fn transport_host(map: &Mapping) -> Option<String> {
    string_field(map, "host")
        .or_else(|| {
            ws_opts(map)
                .and_then(|ws| ws.get("headers"))
                .and_then(YamlValue::as_mapping)
                .and_then(|headers| string_field(headers, "Host"))
        })
        .filter(|h| !h.is_empty())
}
