/// Key layout of the key-value store
///
/// One partition, `kv`, holding whole JSON documents:
/// - `subscriptions` -> `[Source]`
/// - `profiles` -> `[Profile]`
/// - `settings` -> `SettingsOverride`

pub const KV_PARTITION: &str = "kv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKey {
    Subscriptions,
    Profiles,
    Settings,
}

impl DocKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKey::Subscriptions => "subscriptions",
            DocKey::Profiles => "profiles",
            DocKey::Settings => "settings",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.as_str().as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_key_encoding() {
        assert_eq!(DocKey::Subscriptions.encode(), b"subscriptions");
        assert_eq!(DocKey::Profiles.encode(), b"profiles");
        assert_eq!(DocKey::Settings.as_str(), "settings");
    }
}
