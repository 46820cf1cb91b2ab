use crate::clash::LoadBalanceStrategy;
use crate::humanize::ByteSize;
use crate::model::SettingsOverride;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CALLBACK_SECRET: &str = "default-callback-secret";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub subscription: SubscriptionSettings,
}

impl Config {
    pub fn callback_secret(&self) -> &str {
        self.server
            .callback_secret
            .as_deref()
            .unwrap_or(DEFAULT_CALLBACK_SECRET)
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Externally visible base URL used when building converter callbacks.
    /// Derived from the request's `Host` when unset.
    #[serde(default)]
    pub public_url: Option<String>,
    /// HMAC key for callback tokens (loaded from environment, not from config file)
    #[serde(skip)]
    pub callback_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            store_path: default_store_path(),
            public_url: None,
            callback_secret: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/store")
}

/// Outbound feed fetching
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// User agent for traffic probes; feeds answer the header to Clash clients.
    #[serde(default = "default_probe_user_agent")]
    pub probe_user_agent: String,
    #[serde(default = "default_body_timeout_secs")]
    pub body_timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn body_timeout(&self) -> Duration {
        Duration::from_secs(self.body_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            probe_user_agent: default_probe_user_agent(),
            body_timeout_secs: default_body_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            accept_invalid_certs: default_accept_invalid_certs(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_probe_user_agent() -> String {
    "Clash for Windows/0.20.39".to_string()
}

fn default_body_timeout_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(10 * 1024 * 1024)
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_max_redirects() -> usize {
    10
}

/// External conversion service client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConverterConfig {
    #[serde(default = "default_converter_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_converter_timeout_secs")]
    pub timeout_secs: u64,
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            user_agent: default_converter_user_agent(),
            timeout_secs: default_converter_timeout_secs(),
        }
    }
}

fn default_converter_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_converter_timeout_secs() -> u64 {
    30
}

/// Per-request subscription settings. The values here are the defaults;
/// stored settings are merged over them for each request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubscriptionSettings {
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_token")]
    pub token: String,
    #[serde(default = "default_profile_token")]
    pub profile_token: String,
    #[serde(default = "default_converter_host")]
    pub converter_host: String,
    #[serde(default = "default_converter_config")]
    pub converter_config: String,
    #[serde(default = "default_prepend_source_name")]
    pub prepend_source_name: bool,
    #[serde(default)]
    pub load_balance: bool,
    #[serde(default = "default_load_balance_strategy")]
    pub load_balance_strategy: String,
}

/// Profile token that disables profile sharing until changed.
pub const UNSET_PROFILE_TOKEN: &str = "profiles";

impl SubscriptionSettings {
    /// Stored values win where present.
    pub fn merged(&self, stored: &SettingsOverride) -> Self {
        fn pick(stored: &Option<String>, default: &str) -> String {
            stored.clone().unwrap_or_else(|| default.to_string())
        }

        Self {
            file_name: pick(&stored.file_name, &self.file_name),
            token: pick(&stored.token, &self.token),
            profile_token: pick(&stored.profile_token, &self.profile_token),
            converter_host: pick(&stored.converter_host, &self.converter_host),
            converter_config: pick(&stored.converter_config, &self.converter_config),
            prepend_source_name: stored.prepend_source_name.unwrap_or(self.prepend_source_name),
            load_balance: stored.load_balance.unwrap_or(self.load_balance),
            load_balance_strategy: pick(&stored.load_balance_strategy, &self.load_balance_strategy),
        }
    }

    pub fn strategy(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::parse_lossy(&self.load_balance_strategy)
    }

    pub fn profile_sharing_enabled(&self) -> bool {
        self.profile_token != UNSET_PROFILE_TOKEN
    }
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            token: default_token(),
            profile_token: default_profile_token(),
            converter_host: default_converter_host(),
            converter_config: default_converter_config(),
            prepend_source_name: default_prepend_source_name(),
            load_balance: false,
            load_balance_strategy: default_load_balance_strategy(),
        }
    }
}

fn default_file_name() -> String {
    "SubHub".to_string()
}

fn default_token() -> String {
    "auto".to_string()
}

fn default_profile_token() -> String {
    UNSET_PROFILE_TOKEN.to_string()
}

fn default_converter_host() -> String {
    "url.v1.mk".to_string()
}

fn default_converter_config() -> String {
    "https://raw.githubusercontent.com/cmliu/ACL4SSR/main/Clash/config/ACL4SSR_Online_MultiCountry.ini"
        .to_string()
}

fn default_prepend_source_name() -> bool {
    true
}

fn default_load_balance_strategy() -> String {
    LoadBalanceStrategy::RoundRobin.as_str().to_string()
}
