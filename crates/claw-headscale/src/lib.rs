//! # claw-headscale
//!
//! Client for the [Headscale](https://headscale.net) control plane REST API,
//! and the [`DirectorySource`](claw_clusterset::DirectorySource) that feeds
//! Headscale nodes into the clusterset node directory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use claw_headscale::HeadscaleClient;
//!
//! # async fn example() -> claw_headscale::Result<()> {
//! let client = HeadscaleClient::builder("http://127.0.0.1:8080", "api-key").build()?;
//!
//! let health = client.health().await?;
//! println!("database reachable: {}", health.database_connectivity);
//!
//! for node in client.list_nodes(None).await? {
//!     println!("{} {:?} online={}", node.name, node.ip_addresses, node.online);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use client::{DEFAULT_TIMEOUT, HeadscaleClient, HeadscaleClientBuilder};
pub use config::HeadscaleConfig;
pub use error::{HeadscaleError, Result};
pub use source::{NAMESPACE_TAG_PREFIX, SERVICE_TAG_PREFIX};
pub use types::{
    ApiNode, ApiUser, CreateUserRequest, CreateUserResponse, GetNodeResponse, HealthResponse,
    ListNodesResponse,
};
