//! clawdns configuration file.
//!
//! ```toml
//! [headscale]
//! url = "http://127.0.0.1:8080"
//! api_key_env = "HEADSCALE_API_KEY"
//!
//! [directory]
//! refresh_interval_secs = 30
//!
//! [resolver]
//! ttl_secs = 30
//! ```

use std::path::Path;

use anyhow::Context;
use claw_clusterset::{DirectoryConfig, ResolverConfig};
use claw_headscale::HeadscaleConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Control plane connection.
    pub headscale: HeadscaleConfig,
    /// Node directory refresh policy.
    pub directory: DirectoryConfig,
    /// Answer policy.
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// Loads and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;

        Self::from_toml(&content).with_context(|| format!("in config file '{}'", path.display()))
    }

    /// Parses and validates TOML.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.headscale.validate()?;
        self.directory.validate()?;
        self.resolver.validate()?;
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("failed to write config file '{}'", path.display()))
    }

    /// A starting point for `init-config`, pointing at `url`.
    #[must_use]
    pub fn sample(url: &str) -> Self {
        Self {
            headscale: HeadscaleConfig::new(url),
            ..Self::default()
        }
    }
}
