//! Error types for Headscale API operations.

use thiserror::Error;

/// Result type alias for Headscale operations.
pub type Result<T> = std::result::Result<T, HeadscaleError>;

/// Errors that can occur when talking to the Headscale API.
#[derive(Debug, Error)]
pub enum HeadscaleError {
    /// The request could not be sent or the response body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API key was rejected (401 or 403).
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Message returned by the server.
        message: String,
    },

    /// The requested resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// What was looked up.
        resource: String,
    },

    /// Any other non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message returned by the server.
        message: String,
    },

    /// The response body did not match the expected schema.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured base URL is unusable.
    #[error("invalid URL: {message}")]
    InvalidUrl {
        /// Description of the problem.
        message: String,
    },

    /// Invalid client configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl HeadscaleError {
    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    /// Creates a `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if the same request may succeed later.
    ///
    /// Transport failures, throttling and server-side errors are recoverable;
    /// bad credentials, missing resources and schema mismatches are not.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized { .. }
            | Self::NotFound { .. }
            | Self::Json(_)
            | Self::InvalidUrl { .. }
            | Self::Config { .. } => false,
        }
    }

    /// Returns the HTTP status, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
