use std::fmt;

/// Protocol tags understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Shadowsocks,
    ShadowsocksR,
    Vmess,
    Vless,
    Trojan,
    Hysteria,
    Hysteria2,
    Tuic,
}

impl Protocol {
    /// Canonical tag, also used as the link scheme.
    pub fn tag(&self) -> &'static str {
        match self {
            Protocol::Shadowsocks => "ss",
            Protocol::ShadowsocksR => "ssr",
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Hysteria => "hysteria",
            Protocol::Hysteria2 => "hysteria2",
            Protocol::Tuic => "tuic",
        }
    }

    /// Resolve a tag or scheme, including the short hysteria aliases.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_ascii_lowercase();
        match tag.as_str() {
            "ss" => Some(Protocol::Shadowsocks),
            "ssr" => Some(Protocol::ShadowsocksR),
            "vmess" => Some(Protocol::Vmess),
            "vless" => Some(Protocol::Vless),
            "trojan" => Some(Protocol::Trojan),
            "hysteria" | "hy" => Some(Protocol::Hysteria),
            "hysteria2" | "hy2" => Some(Protocol::Hysteria2),
            "tuic" => Some(Protocol::Tuic),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowsocks {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub cipher: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowsocksR {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub cipher: String,
    pub password: String,
    pub protocol: String,
    pub obfs: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vmess {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    pub alter_id: u32,
    pub network: String,
    /// Header obfuscation type (`none`, `http`, ...)
    pub header_type: String,
    pub host: String,
    pub path: String,
    pub tls: bool,
    pub sni: String,
    pub cipher: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vless {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    pub network: Option<String>,
    pub security: Option<String>,
    pub sni: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trojan {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub password: String,
    pub sni: Option<String>,
    pub alpn: Option<String>,
}

/// Shared by hysteria v1 and v2 links.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hysteria {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub auth: String,
    pub sni: Option<String>,
    pub alpn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tuic {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    pub password: String,
    pub sni: Option<String>,
    pub alpn: Option<String>,
}

/// Structured proxy record, one variant per protocol tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRecord {
    Shadowsocks(Shadowsocks),
    ShadowsocksR(ShadowsocksR),
    Vmess(Vmess),
    Vless(Vless),
    Trojan(Trojan),
    Hysteria(Hysteria),
    Hysteria2(Hysteria),
    Tuic(Tuic),
}

impl ProxyRecord {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProxyRecord::Shadowsocks(_) => Protocol::Shadowsocks,
            ProxyRecord::ShadowsocksR(_) => Protocol::ShadowsocksR,
            ProxyRecord::Vmess(_) => Protocol::Vmess,
            ProxyRecord::Vless(_) => Protocol::Vless,
            ProxyRecord::Trojan(_) => Protocol::Trojan,
            ProxyRecord::Hysteria(_) => Protocol::Hysteria,
            ProxyRecord::Hysteria2(_) => Protocol::Hysteria2,
            ProxyRecord::Tuic(_) => Protocol::Tuic,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProxyRecord::Shadowsocks(r) => &r.name,
            ProxyRecord::ShadowsocksR(r) => &r.name,
            ProxyRecord::Vmess(r) => &r.name,
            ProxyRecord::Vless(r) => &r.name,
            ProxyRecord::Trojan(r) => &r.name,
            ProxyRecord::Hysteria(r) | ProxyRecord::Hysteria2(r) => &r.name,
            ProxyRecord::Tuic(r) => &r.name,
        }
    }

    pub fn server(&self) -> &str {
        match self {
            ProxyRecord::Shadowsocks(r) => &r.server,
            ProxyRecord::ShadowsocksR(r) => &r.server,
            ProxyRecord::Vmess(r) => &r.server,
            ProxyRecord::Vless(r) => &r.server,
            ProxyRecord::Trojan(r) => &r.server,
            ProxyRecord::Hysteria(r) | ProxyRecord::Hysteria2(r) => &r.server,
            ProxyRecord::Tuic(r) => &r.server,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ProxyRecord::Shadowsocks(r) => r.port,
            ProxyRecord::ShadowsocksR(r) => r.port,
            ProxyRecord::Vmess(r) => r.port,
            ProxyRecord::Vless(r) => r.port,
            ProxyRecord::Trojan(r) => r.port,
            ProxyRecord::Hysteria(r) | ProxyRecord::Hysteria2(r) => r.port,
            ProxyRecord::Tuic(r) => r.port,
        }
    }
}
