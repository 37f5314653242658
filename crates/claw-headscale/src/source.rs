//! Headscale as a clusterset directory source.
//!
//! Service membership comes from ACL tags. `tag:service-web` and
//! `tag:namespace-default` become the `service=web` and `namespace=default`
//! node tags; every other tag is carried verbatim with an empty value.

use claw_clusterset::node::{NAMESPACE_TAG, SERVICE_TAG};
use claw_clusterset::{DirectorySource, Node, NodeFilter};

use crate::client::HeadscaleClient;
use crate::error::HeadscaleError;
use crate::types::ApiNode;

/// Tag prefix naming the service a node serves.
pub const SERVICE_TAG_PREFIX: &str = "tag:service-";

/// Tag prefix naming the namespace of a node's service.
pub const NAMESPACE_TAG_PREFIX: &str = "tag:namespace-";

impl From<ApiNode> for Node {
    fn from(api: ApiNode) -> Self {
        let mut builder = Node::builder(api.id.as_str(), api.name.as_str()).online(api.online);
        for address in &api.ip_addresses {
            builder = builder.address(address.as_str());
        }
        for tag in api.tags() {
            let (key, value) = split_tag(tag);
            builder = builder.tag(key, value);
        }
        builder.build()
    }
}

fn split_tag(tag: &str) -> (&str, &str) {
    if let Some(service) = tag.strip_prefix(SERVICE_TAG_PREFIX).filter(|s| !s.is_empty()) {
        (SERVICE_TAG, service)
    } else if let Some(namespace) = tag
        .strip_prefix(NAMESPACE_TAG_PREFIX)
        .filter(|s| !s.is_empty())
    {
        (NAMESPACE_TAG, namespace)
    } else {
        (tag, "")
    }
}

impl DirectorySource for HeadscaleClient {
    type Error = HeadscaleError;

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>, HeadscaleError> {
        let nodes = HeadscaleClient::list_nodes(self, filter.user.as_deref()).await?;
        Ok(nodes.into_iter().map(Node::from).collect())
    }
}
