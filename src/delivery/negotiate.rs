//! Output format negotiation

use std::fmt;

/// Output dialect requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Clash,
    SingBox,
    Surge,
    Loon,
    QuantumultX,
    Base64,
    /// Passed through to the converter verbatim.
    Other(String),
}

impl Target {
    pub fn as_str(&self) -> &str {
        match self {
            Target::Clash => "clash",
            Target::SingBox => "singbox",
            Target::Surge => "surge",
            Target::Loon => "loon",
            Target::QuantumultX => "quanx",
            Target::Base64 => "base64",
            Target::Other(name) => name,
        }
    }

    pub fn from_param(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "clash" => Target::Clash,
            "singbox" => Target::SingBox,
            "surge" => Target::Surge,
            "loon" => Target::Loon,
            "quanx" => Target::QuantumultX,
            "base64" => Target::Base64,
            _ => Target::Other(value.to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bare query flags, checked in order.
const FORMAT_FLAGS: &[(&str, Target)] = &[
    ("clash", Target::Clash),
    ("singbox", Target::SingBox),
    ("surge", Target::Surge),
    ("loon", Target::Loon),
    ("base64", Target::Base64),
    ("v2ray", Target::Base64),
    ("trojan", Target::Base64),
];

/// User-agent fragments, checked in order against the lowercased agent.
const AGENT_HINTS: &[(&str, Target)] = &[
    ("clash", Target::Clash),
    ("meta", Target::Clash),
    ("stash", Target::Clash),
    ("nekoray", Target::Clash),
    ("sing-box", Target::SingBox),
    ("shadowrocket", Target::Base64),
    ("v2rayn", Target::Base64),
    ("v2rayng", Target::Base64),
    ("surge", Target::Surge),
    ("loon", Target::Loon),
    ("quantumult%20x", Target::QuantumultX),
    ("quantumult", Target::QuantumultX),
];

/// Parsed request query, order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }
}

/// Explicit `target`, then a bare format flag, then the user agent, then
/// Clash.
pub fn resolve_target(query: &QueryParams, user_agent: &str) -> Target {
    if let Some(target) = query.get("target").filter(|t| !t.is_empty()) {
        return Target::from_param(target);
    }

    if let Some((_, target)) = FORMAT_FLAGS.iter().find(|(flag, _)| query.has(flag)) {
        return target.clone();
    }

    let agent = user_agent.to_ascii_lowercase();
    AGENT_HINTS
        .iter()
        .find(|(hint, _)| agent.contains(hint))
        .map(|(_, target)| target.clone())
        .unwrap_or(Target::Clash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(query: &str, agent: &str) -> Target {
        resolve_target(&QueryParams::parse(query), agent)
    }

    #[test]
    fn test_explicit_target_wins() {
        assert_eq!(resolve("target=surge&clash", "clash-verge"), Target::Surge);
        assert_eq!(resolve("target=mixed", ""), Target::Other("mixed".into()));
        assert_eq!(resolve("target=", "sing-box 1.9"), Target::SingBox);
    }

    #[test]
    fn test_flags_in_order() {
        assert_eq!(resolve("v2ray", "clash"), Target::Base64);
        assert_eq!(resolve("trojan&singbox", ""), Target::SingBox);
        assert_eq!(resolve("loon=1", ""), Target::Loon);
    }

    #[test]
    fn test_user_agent_hints() {
        assert_eq!(resolve("", "ClashMetaForAndroid/2.10"), Target::Clash);
        assert_eq!(resolve("", "sing-box 1.9.0"), Target::SingBox);
        assert_eq!(resolve("", "Shadowrocket/2070"), Target::Base64);
        assert_eq!(resolve("", "v2rayNG/1.8"), Target::Base64);
        assert_eq!(resolve("", "Surge iOS/3000"), Target::Surge);
        assert_eq!(resolve("", "Quantumult%20X/1.4"), Target::QuantumultX);
        assert_eq!(resolve("", "curl/8.0"), Target::Clash);
    }

    #[test]
    fn test_query_params() {
        let query = QueryParams::parse("token=a%20b&clash&token=second");
        assert_eq!(query.get("token"), Some("a b"));
        assert!(query.has("clash"));
        assert_eq!(query.get("clash"), Some(""));
        assert!(!query.has("surge"));
    }
}
