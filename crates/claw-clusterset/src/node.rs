//! Mesh node model.
//!
//! A [`Node`] is one endpoint registered with the coordination control plane.
//! Addresses are kept as the literals the control plane reported; their family
//! is derived from the literal when it is needed.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Tag key carrying the service a node belongs to.
pub const SERVICE_TAG: &str = "service";

/// Tag key carrying the namespace a node belongs to.
pub const NAMESPACE_TAG: &str = "namespace";

/// IP address family of a node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4 address.
    V4,
    /// IPv6 address.
    V6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "ipv4"),
            Self::V6 => write!(f, "ipv6"),
        }
    }
}

/// An address literal as reported for a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(String);

impl NodeAddress {
    /// Creates an address from its literal form.
    #[must_use]
    pub fn new(literal: impl Into<String>) -> Self {
        Self(literal.into())
    }

    /// Returns the literal as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the literal, returning `None` if it is not an IP address.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.trim().parse().ok()
    }

    /// Returns the family of the address, or `None` for malformed literals.
    #[must_use]
    pub fn family(&self) -> Option<AddressFamily> {
        self.ip().map(|ip| match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        })
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<IpAddr> for NodeAddress {
    fn from(value: IpAddr) -> Self {
        Self(value.to_string())
    }
}

/// A mesh node known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within a directory snapshot.
    pub id: String,
    /// Opaque label used for name-based matching.
    pub name: String,
    /// Addresses in the order the control plane reported them.
    pub addresses: Vec<NodeAddress>,
    /// Whether the node is currently connected.
    pub online: bool,
    /// Routing tags (`service`, `namespace`, ...).
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Node {
    /// Creates a new node builder.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(id, name)
    }

    /// Returns the value of a tag, if set.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns the `service` tag, if set.
    #[must_use]
    pub fn service_tag(&self) -> Option<&str> {
        self.tag(SERVICE_TAG)
    }

    /// Returns the `namespace` tag, if set.
    #[must_use]
    pub fn namespace_tag(&self) -> Option<&str> {
        self.tag(NAMESPACE_TAG)
    }

    /// Returns true if the node has at least one address.
    #[must_use]
    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }
}

/// Builder for [`Node`].
#[derive(Debug)]
pub struct NodeBuilder {
    id: String,
    name: String,
    addresses: Vec<NodeAddress>,
    online: bool,
    tags: BTreeMap<String, String>,
}

impl NodeBuilder {
    /// Creates a builder for an online node with no addresses.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            addresses: Vec::new(),
            online: true,
            tags: BTreeMap::new(),
        }
    }

    /// Appends an address.
    #[must_use]
    pub fn address(mut self, address: impl Into<NodeAddress>) -> Self {
        self.addresses.push(address.into());
        self
    }

    /// Sets the online flag.
    #[must_use]
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builds the node.
    #[must_use]
    pub fn build(self) -> Node {
        Node {
            id: self.id,
            name: self.name,
            addresses: self.addresses,
            online: self.online,
            tags: self.tags,
        }
    }
}

/// Filter passed to the directory source when listing nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    /// Restrict the listing to nodes owned by this user.
    #[serde(default)]
    pub user: Option<String>,
}

impl NodeFilter {
    /// A filter that matches every node.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter restricted to one user.
    #[must_use]
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("10.0.0.1", Some(AddressFamily::V4) ; "ipv4")]
    #[test_case("fd11::1", Some(AddressFamily::V6) ; "ipv6")]
    #[test_case("::ffff:10.0.0.1", Some(AddressFamily::V6) ; "ipv4 mapped ipv6 literal")]
    #[test_case(" 100.64.0.7 ", Some(AddressFamily::V4) ; "surrounding whitespace")]
    #[test_case("10.0.0.256", None ; "octet out of range")]
    #[test_case("not-an-ip", None ; "hostname")]
    #[test_case("", None ; "empty")]
    fn test_address_family(literal: &str, expected: Option<AddressFamily>) {
        assert_eq!(NodeAddress::new(literal).family(), expected);
    }

    #[test]
    fn test_address_keeps_literal() {
        let addr = NodeAddress::new("fd11:0:0::1");
        assert_eq!(addr.as_str(), "fd11:0:0::1");
        assert_eq!(addr.to_string(), "fd11:0:0::1");
        assert_eq!(addr.ip().map(|ip| ip.to_string()), Some("fd11::1".to_string()));
    }

    #[test]
    fn test_builder_defaults() {
        let node = Node::builder("node1", "web-service.default").build();

        assert_eq!(node.id, "node1");
        assert_eq!(node.name, "web-service.default");
        assert!(node.online);
        assert!(!node.has_addresses());
        assert!(node.tags.is_empty());
    }

    #[test]
    fn test_builder_full() {
        let node = Node::builder("node2", "api")
            .address("10.0.0.2")
            .address("fd11::2")
            .online(false)
            .tag(SERVICE_TAG, "api")
            .tag(NAMESPACE_TAG, "production")
            .build();

        assert_eq!(node.addresses.len(), 2);
        assert!(!node.online);
        assert_eq!(node.service_tag(), Some("api"));
        assert_eq!(node.namespace_tag(), Some("production"));
        assert_eq!(node.tag("missing"), None);
    }

    #[test]
    fn test_node_serde_roundtrip_shape() {
        let node = Node::builder("n", "web")
            .address("10.0.0.1")
            .tag("service", "web")
            .build();

        let json = serde_json::to_value(&node).expect("serialize");
        assert_eq!(json["addresses"][0], "10.0.0.1");
        assert_eq!(json["tags"]["service"], "web");

        let back: Node = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, node);
    }

    #[test]
    fn test_filter_constructors() {
        assert_eq!(NodeFilter::all().user, None);
        assert_eq!(NodeFilter::for_user("alice").user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_family_display() {
        assert_eq!(AddressFamily::V4.to_string(), "ipv4");
        assert_eq!(AddressFamily::V6.to_string(), "ipv6");
    }
}
