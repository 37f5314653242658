//! Error types for clusterset resolution.
//!
//! Only conditions that a caller has to react to are errors here. A query name
//! that is not shaped like a clusterset-local name is a normal negative result,
//! and a malformed node address is skipped with a warning.

use thiserror::Error;

/// Result type alias for clusterset operations.
pub type Result<T> = std::result::Result<T, ClustersetError>;

/// Boxed error returned by a [`DirectorySource`](crate::DirectorySource).
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while refreshing the directory or resolving queries.
#[derive(Debug, Error)]
pub enum ClustersetError {
    /// No refresh has succeeded yet, so there is nothing to answer from.
    #[error("directory unavailable: no successful refresh yet")]
    DirectoryNotReady,

    /// Another refresh is already running.
    #[error("directory refresh already in progress")]
    RefreshInProgress,

    /// The directory source failed to list nodes.
    #[error("directory source error: {0}")]
    Source(#[source] SourceError),

    /// The directory source did not answer in time.
    #[error("directory refresh timed out after {timeout_secs} seconds")]
    RefreshTimeout {
        /// Configured refresh timeout in seconds.
        timeout_secs: u64,
    },

    /// The refresh was cancelled before it completed.
    #[error("directory refresh cancelled")]
    RefreshCancelled,

    /// Invalid configuration value.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl ClustersetError {
    /// Wraps a directory source failure.
    #[must_use]
    pub fn from_source(err: impl Into<SourceError>) -> Self {
        Self::Source(err.into())
    }

    /// Creates a `RefreshTimeout` error.
    #[must_use]
    pub fn refresh_timeout(timeout_secs: u64) -> Self {
        Self::RefreshTimeout { timeout_secs }
    }

    /// Creates a `Config` error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying later can succeed without operator action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryNotReady
                | Self::RefreshInProgress
                | Self::Source(_)
                | Self::RefreshTimeout { .. }
        )
    }

    /// Returns `true` if this error came out of a refresh attempt.
    #[must_use]
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            Self::Source(_) | Self::RefreshTimeout { .. } | Self::RefreshCancelled
        )
    }
}
