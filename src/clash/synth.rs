//! Load-balanced Clash config synthesis
//!
//! Only `ss`, `vmess` and `trojan` links are representable here; anything
//! else is skipped with a warning and the remaining proxies are still emitted.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::link::{self, ProxyRecord};

pub const LOAD_BALANCE_GROUP: &str = "🔄 Load Balance";
pub const SELECT_GROUP: &str = "🚀 Node Select";
pub const DIRECT_GROUP: &str = "🎯 Direct";
pub const AD_BLOCK_GROUP: &str = "🛑 Ad Block";

const HEALTH_CHECK_URL: &str = "http://www.gstatic.com/generate_204";
const HEALTH_CHECK_INTERVAL_SECS: u32 = 300;
const FALLBACK_NAME: &str = "Node";

const PRIVATE_CIDRS: &[&str] = &[
    "127.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "10.0.0.0/8",
    "17.0.0.0/8",
    "100.64.0.0/10",
];

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("no nodes to synthesize")]
    EmptyNodeList,

    #[error("none of {0} nodes could be converted")]
    NoValidProxies(usize),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalanceStrategy {
    #[default]
    RoundRobin,
    ConsistentHashing,
}

impl LoadBalanceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalanceStrategy::RoundRobin => "round-robin",
            LoadBalanceStrategy::ConsistentHashing => "consistent-hashing",
        }
    }

    /// Parse, falling back to round-robin for anything unrecognized.
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(strategy = value, "unknown load-balance strategy, using round-robin");
            LoadBalanceStrategy::RoundRobin
        })
    }
}

impl FromStr for LoadBalanceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "round-robin" => Ok(LoadBalanceStrategy::RoundRobin),
            "consistent-hashing" => Ok(LoadBalanceStrategy::ConsistentHashing),
            other => Err(format!("unknown load-balance strategy: {}", other)),
        }
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClashProxy {
    Ss {
        name: String,
        server: String,
        port: u16,
        cipher: String,
        password: String,
    },
    Vmess {
        name: String,
        server: String,
        port: u16,
        uuid: String,
        #[serde(rename = "alterId")]
        alter_id: u32,
        cipher: String,
        network: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        servername: Option<String>,
        #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
        ws_opts: Option<WsOpts>,
    },
    Trojan {
        name: String,
        server: String,
        port: u16,
        password: String,
        sni: String,
    },
}

impl ClashProxy {
    fn name_mut(&mut self) -> &mut String {
        match self {
            ClashProxy::Ss { name, .. }
            | ClashProxy::Vmess { name, .. }
            | ClashProxy::Trojan { name, .. } => name,
        }
    }
}

#[derive(Debug, Serialize)]
struct WsOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ProxyGroup {
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<&'static str>,
    proxies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<u32>,
}

impl ProxyGroup {
    fn select(name: &'static str, proxies: Vec<String>) -> Self {
        Self { name, kind: "select", strategy: None, proxies, url: None, interval: None }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClashConfig {
    port: u16,
    socks_port: u16,
    allow_lan: bool,
    mode: &'static str,
    log_level: &'static str,
    external_controller: &'static str,
    proxies: Vec<ClashProxy>,
    proxy_groups: Vec<ProxyGroup>,
    rules: Vec<String>,
}

#[derive(Debug)]
enum Skip {
    Undecodable,
    Unsupported(link::Protocol),
}

fn proxy_from_link(line: &str) -> Result<ClashProxy, Skip> {
    let record = link::decode(line).ok_or(Skip::Undecodable)?;
    let name = {
        let trimmed = record.name().trim();
        if trimmed.is_empty() { FALLBACK_NAME.to_string() } else { trimmed.to_string() }
    };

    let proxy = match record {
        ProxyRecord::Shadowsocks(r) => ClashProxy::Ss {
            name,
            server: r.server,
            port: r.port,
            cipher: r.cipher,
            password: r.password,
        },
        ProxyRecord::Vmess(r) => {
            let ws_opts = (r.network == "ws").then(|| WsOpts {
                path: Some(r.path.clone()).filter(|p| !p.is_empty()),
                headers: Some(r.host.clone())
                    .filter(|h| !h.is_empty())
                    .map(|host| BTreeMap::from([("Host".to_string(), host)]))
                    .unwrap_or_default(),
            });
            ClashProxy::Vmess {
                name,
                server: r.server,
                port: r.port,
                uuid: r.uuid,
                alter_id: r.alter_id,
                cipher: r.cipher,
                network: r.network,
                tls: r.tls.then_some(true),
                servername: Some(r.sni).filter(|s| !s.is_empty()),
                ws_opts,
            }
        }
        ProxyRecord::Trojan(r) => ClashProxy::Trojan {
            name,
            sni: r.sni.unwrap_or_else(|| r.server.clone()),
            server: r.server,
            port: r.port,
            password: r.password,
        },
        other => return Err(Skip::Unsupported(other.protocol())),
    };
    Ok(proxy)
}

/// `name`, else `name_2`, `name_3`, ... whichever is free first.
fn unique_name(taken: &mut HashSet<String>, name: &str) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", name, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn rules() -> Vec<String> {
    let mut rules = vec!["DOMAIN-SUFFIX,local,DIRECT".to_string()];
    rules.extend(PRIVATE_CIDRS.iter().map(|cidr| format!("IP-CIDR,{},DIRECT", cidr)));
    rules.push(format!("DOMAIN-SUFFIX,cn,{}", DIRECT_GROUP));
    rules.push(format!("GEOIP,CN,{}", DIRECT_GROUP));
    rules.push(format!("MATCH,{}", SELECT_GROUP));
    rules
}

/// Render `nodes` as a Clash config with a load-balance group over every
/// convertible proxy.
pub fn synthesize(
    nodes: &[String],
    strategy: LoadBalanceStrategy,
) -> Result<String, SynthesisError> {
    if nodes.is_empty() {
        return Err(SynthesisError::EmptyNodeList);
    }

    let mut taken = HashSet::new();
    let mut proxies = Vec::with_capacity(nodes.len());
    let mut names = Vec::with_capacity(nodes.len());
    for line in nodes {
        match proxy_from_link(line) {
            Ok(mut proxy) => {
                let slot = proxy.name_mut();
                *slot = unique_name(&mut taken, slot);
                names.push(slot.clone());
                proxies.push(proxy);
            }
            Err(Skip::Unsupported(protocol)) => {
                warn!(%protocol, "protocol not supported in synthesized config, skipping");
            }
            Err(Skip::Undecodable) => {
                debug!(link = %line, "undecodable link skipped");
            }
        }
    }

    if proxies.is_empty() {
        return Err(SynthesisError::NoValidProxies(nodes.len()));
    }

    let mut select = vec![LOAD_BALANCE_GROUP.to_string(), "DIRECT".to_string()];
    select.extend(names.iter().cloned());

    let groups = vec![
        ProxyGroup {
            name: LOAD_BALANCE_GROUP,
            kind: "load-balance",
            strategy: Some(strategy.as_str()),
            proxies: names,
            url: Some(HEALTH_CHECK_URL),
            interval: Some(HEALTH_CHECK_INTERVAL_SECS),
        },
        ProxyGroup::select(SELECT_GROUP, select),
        ProxyGroup::select(DIRECT_GROUP, vec!["DIRECT".to_string(), SELECT_GROUP.to_string()]),
        ProxyGroup::select(AD_BLOCK_GROUP, vec!["REJECT".to_string(), "DIRECT".to_string()]),
    ];

    let config = ClashConfig {
        port: 7890,
        socks_port: 7891,
        allow_lan: false,
        mode: "rule",
        log_level: "info",
        external_controller: "127.0.0.1:9090",
        proxies,
        proxy_groups: groups,
        rules: rules(),
    };

    Ok(serde_yaml::to_string(&config)?)
}
