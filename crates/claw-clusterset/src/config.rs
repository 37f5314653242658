//! Configuration for the node directory and the resolver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClustersetError, Result};
use crate::node::NodeFilter;

/// Default interval between directory refreshes.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Default timeout for a single refresh.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;

/// Default TTL for synthesized records.
pub const DEFAULT_TTL_SECS: u32 = 30;

/// How the domain suffix labels are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuffixCase {
    /// Labels must match `svc.clusterset.local` byte for byte.
    #[default]
    Exact,
    /// Labels are compared ignoring ASCII case.
    IgnoreAsciiCase,
}

/// How nodes are matched against a queried service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Match on `service`/`namespace` tags, falling back to the node name for
    /// nodes without a `service` tag.
    #[default]
    TagsThenName,
    /// Only nodes carrying a matching `service` tag.
    TagsOnly,
    /// Case-insensitive containment of the service in the node name.
    NameOnly,
}

/// Node directory configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Seconds between background refreshes.
    pub refresh_interval_secs: u64,
    /// Seconds a single refresh may take before it is abandoned.
    pub refresh_timeout_secs: u64,
    /// Only list nodes owned by this user.
    pub user: Option<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            user: None,
        }
    }
}

impl DirectoryConfig {
    /// Sets the refresh interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_secs = interval.as_secs();
        self
    }

    /// Sets the refresh timeout.
    #[must_use]
    pub const fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout_secs = timeout.as_secs();
        self
    }

    /// Restricts the listing to one user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Refresh interval as a `Duration`.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Refresh timeout as a `Duration`.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// The filter passed to the directory source.
    #[must_use]
    pub fn filter(&self) -> NodeFilter {
        NodeFilter {
            user: self.user.clone(),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(ClustersetError::config(
                "directory.refresh_interval_secs must be greater than 0",
            ));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(ClustersetError::config(
                "directory.refresh_timeout_secs must be greater than 0",
            ));
        }
        if self.refresh_timeout_secs > self.refresh_interval_secs {
            return Err(ClustersetError::config(
                "directory.refresh_timeout_secs cannot exceed refresh_interval_secs",
            ));
        }
        if self.user.as_deref().is_some_and(str::is_empty) {
            return Err(ClustersetError::config("directory.user cannot be empty"));
        }
        Ok(())
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// TTL attached to every synthesized record.
    pub ttl_secs: u32,
    /// Node matching strategy.
    pub match_strategy: MatchStrategy,
    /// Suffix label comparison.
    pub suffix_case: SuffixCase,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            match_strategy: MatchStrategy::default(),
            suffix_case: SuffixCase::default(),
        }
    }
}

impl ResolverConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        // RFC 2181 caps TTLs at 2^31 - 1.
        if self.ttl_secs > i32::MAX as u32 {
            return Err(ClustersetError::config(
                "resolver.ttl_secs cannot exceed 2147483647",
            ));
        }
        Ok(())
    }
}
