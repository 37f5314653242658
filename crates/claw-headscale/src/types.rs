//! Headscale REST API request and response bodies.
//!
//! Field names follow the API's camelCase JSON. Everything except `id` and
//! `name` is optional on the wire; older servers omit tags and routes, and
//! empty lists may arrive as `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Reads a missing or `null` value as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A node as returned by `/api/v1/node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNode {
    /// Node identifier.
    pub id: String,
    /// Machine public key.
    #[serde(default)]
    pub machine_key: String,
    /// Node public key.
    #[serde(default)]
    pub node_key: String,
    /// Disco public key.
    #[serde(default)]
    pub disco_key: String,
    /// Mesh address literals, IPv4 and IPv6.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip_addresses: Vec<String>,
    /// Hostname registered by the node.
    pub name: String,
    /// Name assigned by the operator, if any.
    #[serde(default)]
    pub given_name: String,
    /// Owning user.
    #[serde(default)]
    pub user: Option<ApiUser>,
    /// Last time the control plane heard from the node.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Key expiry.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    /// Registration time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// How the node was registered.
    #[serde(default)]
    pub register_method: String,
    /// Whether the node is currently connected.
    #[serde(default)]
    pub online: bool,
    /// Tags set by an administrator.
    #[serde(default, deserialize_with = "null_as_default")]
    pub forced_tags: Vec<String>,
    /// Tags requested by the node and allowed by policy.
    #[serde(default, deserialize_with = "null_as_default")]
    pub valid_tags: Vec<String>,
    /// Subnet routes enabled for the node.
    #[serde(default, deserialize_with = "null_as_default")]
    pub approved_routes: Vec<String>,
    /// Subnet routes advertised by the node.
    #[serde(default, deserialize_with = "null_as_default")]
    pub available_routes: Vec<String>,
}

impl ApiNode {
    /// Forced tags followed by valid tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.forced_tags
            .iter()
            .chain(&self.valid_tags)
            .map(String::as_str)
    }
}

/// A Headscale user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    /// User identifier.
    pub id: String,
    /// User name.
    pub name: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
}

/// Body of `GET /api/v1/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Whether the server can reach its database.
    #[serde(default)]
    pub database_connectivity: bool,
}

/// Body of `GET /api/v1/node`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNodesResponse {
    /// All nodes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<ApiNode>,
}

/// Body of `GET /api/v1/node/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNodeResponse {
    /// The node.
    pub node: ApiNode,
}

/// Body of `POST /api/v1/user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// User name.
    pub name: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl CreateUserRequest {
    /// Creates a request for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
}

/// Body returned by `POST /api/v1/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// The created user.
    pub user: ApiUser,
}
