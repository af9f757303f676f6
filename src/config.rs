//! Client configuration

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BROADCAST_CAPACITY: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Settings for the HTTP transport and the chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub api_url: String,
    pub timeout: Duration,
    /// Use the streaming endpoint for sends
    pub streaming: bool,
    /// Buffered session updates per subscriber before it lags
    pub broadcast_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            streaming: true,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Read `LEXCHAT_*` variables, falling back to defaults for unset ones
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a variable that is set but
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("LEXCHAT_API_URL").filter(|u| !u.trim().is_empty()) {
            config = config.with_api_url(url);
        }
        if let Some(value) = lookup("LEXCHAT_TIMEOUT_SECS") {
            let secs = parse_number("LEXCHAT_TIMEOUT_SECS", &value)?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(value) = lookup("LEXCHAT_STREAMING") {
            config = config.with_streaming(parse_bool("LEXCHAT_STREAMING", &value)?);
        }
        if let Some(value) = lookup("LEXCHAT_BROADCAST_CAPACITY") {
            let capacity = parse_number("LEXCHAT_BROADCAST_CAPACITY", &value)?;
            let capacity = usize::try_from(capacity).map_err(|_| ConfigError::InvalidValue {
                var: "LEXCHAT_BROADCAST_CAPACITY",
                expected: "a positive integer",
                value: value.clone(),
            })?;
            config = config.with_broadcast_capacity(capacity);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    #[must_use]
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "a positive integer",
            value: value.to_string(),
        }),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.streaming);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("LEXCHAT_API_URL", "https://legal.example/api/"),
            ("LEXCHAT_TIMEOUT_SECS", "30"),
            ("LEXCHAT_STREAMING", "off"),
            ("LEXCHAT_BROADCAST_CAPACITY", "16"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://legal.example/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.streaming);
        assert_eq!(config.broadcast_capacity, 16);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err =
            ClientConfig::from_lookup(lookup(&[("LEXCHAT_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "LEXCHAT_TIMEOUT_SECS",
                ..
            }
        ));
        assert!(ClientConfig::from_lookup(lookup(&[("LEXCHAT_STREAMING", "maybe")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("LEXCHAT_BROADCAST_CAPACITY", "0")])).is_err());
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_api_url("http://backend.test//")
            .with_timeout(Duration::from_secs(5))
            .with_streaming(false)
            .with_broadcast_capacity(0);
        assert_eq!(config.api_url, "http://backend.test");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.streaming);
        assert_eq!(config.broadcast_capacity, 1);
    }
}
