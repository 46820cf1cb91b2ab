use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },

    #[error("Subscription token must not be empty")]
    EmptyToken,

    #[error("fetch.max_body_bytes must be positive")]
    InvalidMaxBodyBytes,

    #[error("server.public_url must start with http:// or https://: {0}")]
    InvalidPublicUrl(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_timeouts(config)?;
    validate_subscription(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("fetch.body_timeout_secs", config.fetch.body_timeout_secs),
        ("fetch.probe_timeout_secs", config.fetch.probe_timeout_secs),
        ("converter.timeout_secs", config.converter.timeout_secs),
    ];
    if let Some((field, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
        return Err(ValidationError::ZeroTimeout { field: *field });
    }

    if config.fetch.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxBodyBytes);
    }

    Ok(())
}

fn validate_subscription(config: &Config) -> Result<(), ValidationError> {
    if config.subscription.token.trim().is_empty() {
        return Err(ValidationError::EmptyToken);
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if let Some(url) = &config.server.public_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ValidationError::InvalidPublicUrl(url.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.converter.timeout_secs = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroTimeout { field: "converter.timeout_secs" })
        ));
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut config = Config::default();
        config.subscription.token = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyToken)));
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let mut config = Config::default();
        config.fetch.max_body_bytes = ByteSize(0);
        assert!(matches!(validate(&config), Err(ValidationError::InvalidMaxBodyBytes)));
    }

    #[test]
    fn test_public_url_scheme() {
        let mut config = Config::default();
        config.server.public_url = Some("sub.example.com".to_string());
        assert!(matches!(validate(&config), Err(ValidationError::InvalidPublicUrl(_))));
    }
}
