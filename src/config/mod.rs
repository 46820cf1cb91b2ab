//! Configuration management for SubHub
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file
//! 4. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use subhub::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `SUBHUB__<section>__<key>`:
//! - `SUBHUB__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `SUBHUB__FETCH__MAX_BODY_BYTES=20MB`
//! - `SUBHUB__SUBSCRIPTION__CONVERTER_HOST=api.example.com`
//!
//! The callback signing key is read from `SUBHUB_CALLBACK_SECRET` only.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/subhub.toml`.
//! This can be overridden using the `SUBHUB_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, ConverterConfig, DEFAULT_CALLBACK_SECRET, FetchConfig, ServerConfig,
    SubscriptionSettings, UNSET_PROFILE_TOKEN,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[subscription]\nfile_name = \"Team\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.subscription.file_name, "Team");
        assert_eq!(config.subscription.token, "auto");
    }

    #[test]
    fn test_validation_catches_zero_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[fetch]\nbody_timeout_secs = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroTimeout { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[fetch\nbody_timeout_secs = ").unwrap();

        assert!(matches!(
            Config::load_from_path(config_path),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped: Config = toml::from_str(include_str!("../../config/subhub.toml")).unwrap();
        let defaults = Config::default();

        assert_eq!(shipped.subscription, defaults.subscription);
        assert_eq!(shipped.server.bind_addr, defaults.server.bind_addr);
        assert_eq!(shipped.server.store_path, defaults.server.store_path);
        assert_eq!(shipped.fetch.max_body_bytes, defaults.fetch.max_body_bytes);
        assert_eq!(shipped.fetch.probe_user_agent, defaults.fetch.probe_user_agent);
        assert_eq!(shipped.converter.timeout_secs, defaults.converter.timeout_secs);
    }
}
