//! Persisted subscription data: sources, profiles, traffic info, stored settings
//!
//! JSON layouts follow the documents the dashboard writes into the key-value
//! store (camelCase, `userInfo`, `manualNodes`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// A remote feed (`http`/`https` URL) or one or more literal manual links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Present only after a successful probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<TrafficInfo>,
}

impl Source {
    pub fn is_remote(&self) -> bool {
        self.url.to_ascii_lowercase().starts_with("http")
    }

    /// Name used in logs: the display name, else the url.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.url } else { &self.name }
    }
}

/// A named, shareable subset of sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Member ids of remote sources
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Member ids of manual sources
    #[serde(default)]
    pub manual_nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_converter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_config: Option<String>,
}

impl Profile {
    /// Enabled member sources, in source order. Remote sources are selected by
    /// `subscriptions`, manual ones by `manual_nodes`.
    pub fn members<'a>(&self, sources: &'a [Source]) -> Vec<&'a Source> {
        sources
            .iter()
            .filter(|source| source.enabled)
            .filter(|source| {
                let ids = if source.is_remote() {
                    &self.subscriptions
                } else {
                    &self.manual_nodes
                };
                ids.contains(&source.id)
            })
            .collect()
    }

    pub fn converter_override(&self) -> Option<&str> {
        non_blank(self.sub_converter.as_deref())
    }

    pub fn config_override(&self) -> Option<&str> {
        non_blank(self.sub_config.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Usage reported by a feed's `subscription-userinfo` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrafficInfo {
    #[serde(default)]
    pub upload: u64,
    #[serde(default)]
    pub download: u64,
    #[serde(default)]
    pub total: u64,
    /// Expiry as unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<u64>,
}

impl TrafficInfo {
    pub fn used(&self) -> u64 {
        self.upload.saturating_add(self.download)
    }

    /// Bytes left, 0 when the total is unknown or exhausted.
    pub fn remaining(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        self.total.saturating_sub(self.used())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expire?).ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// Settings as stored by the dashboard. Every field is optional and merged
/// over the configured defaults per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsOverride {
    #[serde(rename = "FileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "mytoken", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "profileToken", default, skip_serializing_if = "Option::is_none")]
    pub profile_token: Option<String>,
    #[serde(rename = "subConverter", default, skip_serializing_if = "Option::is_none")]
    pub converter_host: Option<String>,
    #[serde(rename = "subConfig", default, skip_serializing_if = "Option::is_none")]
    pub converter_config: Option<String>,
    #[serde(rename = "prependSubName", default, skip_serializing_if = "Option::is_none")]
    pub prepend_source_name: Option<bool>,
    #[serde(rename = "enableLoadBalance", default, skip_serializing_if = "Option::is_none")]
    pub load_balance: Option<bool>,
    #[serde(rename = "loadBalanceStrategy", default, skip_serializing_if = "Option::is_none")]
    pub load_balance_strategy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(id: &str, url: &str, enabled: bool) -> Source {
        Source {
            id: id.to_string(),
            name: id.to_string(),
            url: url.to_string(),
            enabled,
            user_info: None,
        }
    }

    #[test]
    fn test_remaining_never_negative() {
        let info = TrafficInfo { upload: 80, download: 40, total: 100, expire: None };
        assert_eq!(info.remaining(), 0);
        assert_eq!(TrafficInfo::default().remaining(), 0);
    }

    #[test]
    fn test_expiry_as_utc() {
        let info = TrafficInfo { expire: Some(1_767_225_600), ..Default::default() };
        assert_eq!(info.expires_at().unwrap().to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(TrafficInfo::default().expires_at(), None);
    }

    #[test]
    fn test_profile_members_partition() {
        let sources = vec![
            source("a", "https://feed.example.com/a", true),
            source("b", "trojan://pw@h:443#b", true),
            source("c", "https://feed.example.com/c", false),
            source("d", "ss://x@h:1#d", true),
        ];
        let profile = Profile {
            id: "p1".into(),
            custom_id: Some("team".into()),
            name: "Team".into(),
            enabled: true,
            // "b" is manual, so listing it under subscriptions does not select it
            subscriptions: vec!["a".into(), "b".into(), "c".into()],
            manual_nodes: vec!["d".into()],
            sub_converter: Some("  ".into()),
            sub_config: None,
        };

        let ids: Vec<_> = profile.members(&sources).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(profile.converter_override(), None);
    }

    #[test]
    fn test_source_json_layout() {
        let value = json!({
            "id": "s1",
            "name": "Feed",
            "url": "https://feed.example.com",
            "userInfo": {"upload": 1, "download": 2, "total": 10, "expire": 99}
        });
        let source: Source = serde_json::from_value(value).unwrap();
        assert!(source.enabled);
        assert!(source.is_remote());
        assert_eq!(source.user_info.unwrap().remaining(), 7);
    }

    #[test]
    fn test_settings_override_keys() {
        let value = json!({"FileName": "Mine", "mytoken": "t", "enableLoadBalance": true});
        let stored: SettingsOverride = serde_json::from_value(value).unwrap();
        assert_eq!(stored.file_name.as_deref(), Some("Mine"));
        assert_eq!(stored.token.as_deref(), Some("t"));
        assert_eq!(stored.load_balance, Some(true));
        assert_eq!(stored.converter_host, None);
    }
}
