//! Headscale connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{HeadscaleClient, parse_base_url};
use crate::error::{HeadscaleError, Result};

/// Default Headscale API address.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8080";

/// Environment variable consulted for the API key when none is configured.
pub const DEFAULT_API_KEY_ENV: &str = "HEADSCALE_API_KEY";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// How to reach the Headscale API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadscaleConfig {
    /// Base URL of the Headscale server.
    pub url: String,
    /// API key. Prefer `api_key_env` so the key stays out of config files.
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HeadscaleConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: None,
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HeadscaleConfig {
    /// Creates a config for `url` with defaults for everything else.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the configured API key, falling back to `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        match self.api_key_env.as_deref() {
            Some(var) => std::env::var(var)
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| HeadscaleError::config(format!("API key not set (checked ${var})"))),
            None => Err(HeadscaleError::config("API key not set")),
        }
    }

    /// Validates everything except the API key.
    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.url)?;
        if self.timeout_secs == 0 {
            return Err(HeadscaleError::config(
                "headscale.timeout_secs must be greater than 0",
            ));
        }
        if self.api_key_env.as_deref().is_some_and(str::is_empty) {
            return Err(HeadscaleError::config("headscale.api_key_env cannot be empty"));
        }
        Ok(())
    }

    /// Validates the config and builds a client.
    pub fn build_client(&self) -> Result<HeadscaleClient> {
        self.validate()?;
        HeadscaleClient::builder(&self.url, self.resolve_api_key()?)
            .timeout(self.timeout())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeadscaleConfig::default();

        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.api_key_env.as_deref(), Some(DEFAULT_API_KEY_ENV));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_key_wins() {
        let config = HeadscaleConfig::new("http://hs:8080").with_api_key("secret");
        assert_eq!(config.resolve_api_key().expect("key"), "secret");
    }

    #[test]
    fn test_missing_key_names_the_variable() {
        let config = HeadscaleConfig {
            api_key_env: Some("CLAW_HEADSCALE_TEST_UNSET_KEY".to_string()),
            ..HeadscaleConfig::default()
        };

        let err = config.resolve_api_key().expect_err("unset");
        assert!(err.to_string().contains("CLAW_HEADSCALE_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_no_key_source() {
        let config = HeadscaleConfig {
            api_key_env: None,
            ..HeadscaleConfig::default()
        };
        assert!(config.resolve_api_key().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = HeadscaleConfig {
            timeout_secs: 0,
            ..HeadscaleConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_url() {
        let err = HeadscaleConfig::new("hs:8080").validate().expect_err("bad url");
        assert!(matches!(err, HeadscaleError::InvalidUrl { .. }));
    }

    #[test]
    fn test_build_client() {
        let client = HeadscaleConfig::new("http://hs.internal:8080")
            .with_api_key("secret")
            .build_client()
            .expect("client");

        assert_eq!(client.base_url().host_str(), Some("hs.internal"));
    }

    #[test]
    fn test_parse_from_toml() {
        let config: HeadscaleConfig = toml::from_str(
            r#"
            url = "https://hs.example.com"
            api_key_env = "HS_KEY"
            "#,
        )
        .expect("parse");

        assert_eq!(config.url, "https://hs.example.com");
        assert_eq!(config.api_key_env.as_deref(), Some("HS_KEY"));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
