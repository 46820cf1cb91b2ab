//! Link codec: canonical node links <-> structured proxy records
//!
//! A node link is the durable wire form of a proxy server. Every protocol
//! except `vmess` carries credentials in the URI user-info, the endpoint in
//! host/port, options in the query and the display name in the fragment.
//! `vmess` links wrap a fixed-key JSON object in base64.
//!
//! [`decode`] never fails loudly: malformed input yields `None` and the caller
//! drops the line.

pub mod b64;
mod records;
pub mod uri;
pub mod vmess;

pub use records::{
    Hysteria, Protocol, ProxyRecord, Shadowsocks, ShadowsocksR, Trojan, Tuic, Vless, Vmess,
};

use uri::{UriParts, assemble, encode_component, query_string, split_fragment};

/// Schemes accepted when filtering newline-delimited feeds.
///
/// Wider than [`Protocol`]: short hysteria aliases and `anytls` pass through
/// untouched even though the codec cannot decode them.
pub const LINE_SCHEMES: &[&str] = &[
    "ss", "ssr", "vmess", "vless", "trojan", "hysteria", "hysteria2", "hy", "hy2", "tuic",
    "anytls",
];

/// Whether a trimmed line starts with one of [`LINE_SCHEMES`].
pub fn has_known_scheme(line: &str) -> bool {
    line.split_once("://")
        .is_some_and(|(scheme, _)| LINE_SCHEMES.contains(&scheme))
}

/// Encode a record into its canonical link.
pub fn encode(record: &ProxyRecord) -> String {
    match record {
        ProxyRecord::Shadowsocks(r) => {
            let userinfo = b64::encode(format!("{}:{}", r.cipher, r.password));
            assemble("ss", &userinfo, &r.server, r.port, "", Some(&r.name))
        }
        ProxyRecord::ShadowsocksR(r) => {
            let userinfo = b64::encode(format!("{}:{}", r.cipher, r.password));
            let query = query_string(&[
                ("protocol", Some(&r.protocol)),
                ("obfs", Some(&r.obfs)),
                ("remarks", Some(&r.name)),
            ]);
            assemble("ssr", &userinfo, &r.server, r.port, &query, None)
        }
        ProxyRecord::Vmess(r) => vmess::encode(r),
        ProxyRecord::Vless(r) => {
            let query = query_string(&[
                ("type", r.network.as_deref()),
                ("security", r.security.as_deref()),
                ("sni", r.sni.as_deref()),
                ("host", r.host.as_deref()),
                ("path", r.path.as_deref()),
            ]);
            assemble("vless", &encode_component(&r.uuid), &r.server, r.port, &query, Some(&r.name))
        }
        ProxyRecord::Trojan(r) => {
            let query = query_string(&[("sni", r.sni.as_deref()), ("alpn", r.alpn.as_deref())]);
            let userinfo = encode_component(&r.password);
            assemble("trojan", &userinfo, &r.server, r.port, &query, Some(&r.name))
        }
        ProxyRecord::Hysteria(r) | ProxyRecord::Hysteria2(r) => {
            let query = query_string(&[("sni", r.sni.as_deref()), ("alpn", r.alpn.as_deref())]);
            let scheme = record.protocol().tag();
            assemble(scheme, &encode_component(&r.auth), &r.server, r.port, &query, Some(&r.name))
        }
        ProxyRecord::Tuic(r) => {
            let userinfo =
                format!("{}:{}", encode_component(&r.uuid), encode_component(&r.password));
            let query = query_string(&[("sni", r.sni.as_deref()), ("alpn", r.alpn.as_deref())]);
            assemble("tuic", &userinfo, &r.server, r.port, &query, Some(&r.name))
        }
    }
}

/// Decode a link into a record; `None` for unknown schemes or malformed input.
pub fn decode(link: &str) -> Option<ProxyRecord> {
    let link = link.trim();
    let (scheme, _) = link.split_once("://")?;
    match Protocol::from_tag(scheme)? {
        Protocol::Vmess => vmess::decode(link).map(ProxyRecord::Vmess),
        Protocol::Shadowsocks => decode_ss(link).map(ProxyRecord::Shadowsocks),
        protocol => {
            let parts = UriParts::parse(link)?;
            decode_uri(protocol, parts)
        }
    }
}

fn decode_uri(protocol: Protocol, parts: UriParts) -> Option<ProxyRecord> {
    let name = parts.fragment.clone().unwrap_or_default();
    let record = match protocol {
        Protocol::ShadowsocksR => {
            let (cipher, password) = split_credentials(&parts.userinfo)?;
            ProxyRecord::ShadowsocksR(ShadowsocksR {
                name: parts
                    .fragment
                    .clone()
                    .or_else(|| parts.param("remarks").map(str::to_string))
                    .unwrap_or_default(),
                server: parts.host.clone(),
                port: parts.port,
                cipher,
                password,
                protocol: parts.param("protocol").unwrap_or("origin").to_string(),
                obfs: parts.param("obfs").unwrap_or("plain").to_string(),
            })
        }
        Protocol::Vless => ProxyRecord::Vless(Vless {
            network: parts.param_owned("type"),
            security: parts.param_owned("security"),
            sni: parts.param_owned("sni"),
            host: parts.param_owned("host"),
            path: parts.param_owned("path"),
            name,
            server: parts.host,
            port: parts.port,
            uuid: parts.userinfo,
        }),
        Protocol::Trojan => ProxyRecord::Trojan(Trojan {
            sni: parts.param_owned("sni"),
            alpn: parts.param_owned("alpn"),
            name,
            server: parts.host,
            port: parts.port,
            password: parts.userinfo,
        }),
        Protocol::Hysteria | Protocol::Hysteria2 => {
            let record = Hysteria {
                sni: parts.param_owned("sni"),
                alpn: parts.param_owned("alpn"),
                name,
                server: parts.host,
                port: parts.port,
                auth: parts.userinfo,
            };
            if protocol == Protocol::Hysteria {
                ProxyRecord::Hysteria(record)
            } else {
                ProxyRecord::Hysteria2(record)
            }
        }
        Protocol::Tuic => {
            let (uuid, password) = match parts.userinfo.split_once(':') {
                Some((uuid, password)) => (uuid.to_string(), password.to_string()),
                None => (parts.userinfo.clone(), String::new()),
            };
            ProxyRecord::Tuic(Tuic {
                sni: parts.param_owned("sni"),
                alpn: parts.param_owned("alpn"),
                name,
                server: parts.host,
                port: parts.port,
                uuid,
                password,
            })
        }
        Protocol::Shadowsocks | Protocol::Vmess => return None,
    };
    Some(record)
}

fn decode_ss(link: &str) -> Option<Shadowsocks> {
    if let Some(parts) = UriParts::parse(link) {
        let (cipher, password) = split_credentials(&parts.userinfo)?;
        return Some(Shadowsocks {
            name: parts.fragment.unwrap_or_default(),
            server: parts.host,
            port: parts.port,
            cipher,
            password,
        });
    }

    // Legacy form: ss://base64(method:password@host:port)#name
    let (body, fragment) = split_fragment(link.strip_prefix("ss://")?);
    let decoded = b64::decode_text(body)?;
    let inner = UriParts::parse(&format!("ss://{}", decoded))?;
    let (cipher, password) = split_credentials(&inner.userinfo)?;
    Some(Shadowsocks {
        name: fragment.map(uri::decode_component_lossy).unwrap_or_default(),
        server: inner.host,
        port: inner.port,
        cipher,
        password,
    })
}

/// `method:password`, either plain or base64-wrapped.
fn split_credentials(userinfo: &str) -> Option<(String, String)> {
    let plain = if userinfo.contains(':') {
        userinfo.to_string()
    } else {
        b64::decode_text(userinfo)?
    };
    let (method, password) = plain.split_once(':')?;
    Some((method.to_string(), password.to_string()))
}

pub(crate) fn prefixed_name(prefix: &str, original: &str) -> String {
    if original.is_empty() {
        prefix.to_string()
    } else {
        format!("{} - {}", prefix, original)
    }
}

/// Prefix a link's display name. Idempotent: a name already starting with
/// `prefix` is left alone.
///
/// `vmess` rewrites the embedded `ps`; everything else rewrites the fragment.
pub fn prepend_name(link: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return link.to_string();
    }
    if link.starts_with(vmess::SCHEME_PREFIX) {
        if let Some(prefixed) = vmess::prepend_name(link, prefix) {
            return prefixed;
        }
        tracing::debug!(prefix, "vmess payload unreadable, prefixing fragment instead");
    }
    prepend_fragment(link, prefix)
}

fn prepend_fragment(link: &str, prefix: &str) -> String {
    let (base, fragment) = split_fragment(link);
    let original = fragment.map(uri::decode_component_lossy).unwrap_or_default();
    if original.starts_with(prefix) {
        return link.to_string();
    }
    format!("{}#{}", base, encode_component(&prefixed_name(prefix, &original)))
}

/// Percent-decoded display name carried in the fragment, if any.
///
/// `None` for links without a fragment and for fragments that do not decode
/// to UTF-8.
pub fn fragment_name(link: &str) -> Option<String> {
    let (_, fragment) = split_fragment(link);
    uri::decode_component(fragment?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: ProxyRecord) {
        let link = encode(&record);
        let decoded = decode(&link).unwrap_or_else(|| panic!("failed to decode {link}"));
        assert_eq!(decoded, record, "record mismatch for {link}");
        assert_eq!(encode(&decoded), link);
    }

    #[test]
    fn test_roundtrip_every_protocol() {
        roundtrip(ProxyRecord::Shadowsocks(Shadowsocks {
            name: "HK 01".into(),
            server: "hk.example.com".into(),
            port: 8388,
            cipher: "aes-256-gcm".into(),
            password: "p:w".into(),
        }));
        roundtrip(ProxyRecord::ShadowsocksR(ShadowsocksR {
            name: "SSR node".into(),
            server: "1.1.1.1".into(),
            port: 9000,
            cipher: "aes-256-cfb".into(),
            password: "secret".into(),
            protocol: "auth_aes128_md5".into(),
            obfs: "tls1.2_ticket_auth".into(),
        }));
        roundtrip(ProxyRecord::Vmess(Vmess {
            name: "A".into(),
            server: "1.2.3.4".into(),
            port: 443,
            uuid: "u".into(),
            alter_id: 0,
            network: "tcp".into(),
            header_type: "none".into(),
            host: String::new(),
            path: String::new(),
            tls: false,
            sni: String::new(),
            cipher: "auto".into(),
        }));
        roundtrip(ProxyRecord::Vless(Vless {
            name: "vl".into(),
            server: "v.example.com".into(),
            port: 443,
            uuid: "0b6c5a4e-1111-2222-3333-444455556666".into(),
            network: Some("ws".into()),
            security: Some("tls".into()),
            sni: Some("v.example.com".into()),
            host: None,
            path: Some("/ws?ed=2048".into()),
        }));
        roundtrip(ProxyRecord::Trojan(Trojan {
            name: "日本 東京".into(),
            server: "jp.example.com".into(),
            port: 443,
            password: "pa@ss#word".into(),
            sni: Some("jp.example.com".into()),
            alpn: Some("h2,http/1.1".into()),
        }));
        roundtrip(ProxyRecord::Hysteria(Hysteria {
            name: "hy".into(),
            server: "h.example.com".into(),
            port: 36712,
            auth: "token".into(),
            sni: None,
            alpn: Some("h3".into()),
        }));
        roundtrip(ProxyRecord::Hysteria2(Hysteria {
            name: "hy2".into(),
            server: "2001:db8::2".into(),
            port: 443,
            auth: "token".into(),
            sni: Some("h2.example.com".into()),
            alpn: None,
        }));
        roundtrip(ProxyRecord::Tuic(Tuic {
            name: "tuic".into(),
            server: "t.example.com".into(),
            port: 443,
            uuid: "uuid".into(),
            password: "pw".into(),
            sni: Some("t.example.com".into()),
            alpn: Some("h3".into()),
        }));
    }

    #[test]
    fn test_encode_ss_shape() {
        let link = encode(&ProxyRecord::Shadowsocks(Shadowsocks {
            name: "Test".into(),
            server: "1.2.3.4".into(),
            port: 8388,
            cipher: "aes-256-gcm".into(),
            password: "test".into(),
        }));
        assert_eq!(link, "ss://YWVzLTI1Ni1nY206dGVzdA==@1.2.3.4:8388#Test");
    }

    #[test]
    fn test_decode_foreign_forms() {
        let plain = decode("ss://aes-128-gcm:pw@h:1#x").unwrap();
        assert_eq!(plain.name(), "x");
        assert_eq!(plain.port(), 1);

        let legacy = format!("ss://{}#Legacy", b64::encode("aes-256-gcm:pw@10.0.0.1:8388"));
        match decode(&legacy).unwrap() {
            ProxyRecord::Shadowsocks(r) => {
                assert_eq!(r.server, "10.0.0.1");
                assert_eq!(r.password, "pw");
                assert_eq!(r.name, "Legacy");
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(decode("hy2://a@h:443#n").unwrap().protocol(), Protocol::Hysteria2);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("").is_none());
        assert!(decode("http://example.com").is_none());
        assert!(decode("anytls://pw@h:443#n").is_none());
        assert!(decode("trojan://missing-port@host#n").is_none());
        assert!(decode("ss://!!!@h:1#n").is_none());
    }

    #[test]
    fn test_prepend_fragment() {
        assert_eq!(
            prepend_name("trojan://pw@h:443#test", "Sub"),
            "trojan://pw@h:443#Sub%20-%20test"
        );
        assert_eq!(prepend_name("trojan://pw@h:443", "Sub"), "trojan://pw@h:443#Sub");
        assert_eq!(prepend_name("trojan://pw@h:443#test", ""), "trojan://pw@h:443#test");
    }

    #[test]
    fn test_prepend_is_idempotent() {
        let links = [
            "ss://YWVzLTI1Ni1nY206dGVzdA==@1.2.3.4:8388#Test".to_string(),
            "trojan://pw@h:443".to_string(),
            vmess::encode(&Vmess {
                name: "v".into(),
                server: "h".into(),
                port: 1,
                uuid: "u".into(),
                alter_id: 0,
                network: "tcp".into(),
                header_type: "none".into(),
                host: String::new(),
                path: String::new(),
                tls: false,
                sni: String::new(),
                cipher: "auto".into(),
            }),
        ];
        for link in links {
            let once = prepend_name(&link, "机场");
            assert_eq!(prepend_name(&once, "机场"), once);
        }
    }

    #[test]
    fn test_has_known_scheme() {
        assert!(has_known_scheme("ss://abc"));
        assert!(has_known_scheme("hy2://abc"));
        assert!(has_known_scheme("anytls://abc"));
        assert!(!has_known_scheme("https://example.com"));
        assert!(!has_known_scheme("ss:/abc"));
        assert!(!has_known_scheme("# comment"));
    }

    #[test]
    fn test_fragment_name() {
        assert_eq!(fragment_name("ss://a@b:1#A%20B").as_deref(), Some("A B"));
        assert_eq!(fragment_name("ss://a@b:1"), None);
        assert_eq!(fragment_name("ss://a@b:1#%FF"), None);
    }
}
