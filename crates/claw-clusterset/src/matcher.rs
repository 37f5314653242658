//! Selection of directory nodes for a queried service.
//!
//! Offline nodes never match. Among online nodes, explicit `service` and
//! `namespace` tags decide membership; the node-name heuristic is only used
//! for nodes that carry no `service` tag. The heuristic ignores the
//! namespace.

use crate::config::MatchStrategy;
use crate::node::Node;
use crate::snapshot::DirectorySnapshot;

/// Why a node was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    /// The node's `service` tag (and `namespace` tag, if present) matched.
    Tags,
    /// The node name contains the service.
    Name,
}

/// Matches nodes against a service and namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    strategy: MatchStrategy,
}

impl Matcher {
    /// Creates a matcher using `strategy`.
    #[must_use]
    pub const fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    /// The configured strategy.
    #[must_use]
    pub const fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Returns the online nodes that serve `service` in `namespace`, in
    /// snapshot order.
    #[must_use]
    pub fn matches<'a>(
        &self,
        service: &str,
        namespace: &str,
        snapshot: &'a DirectorySnapshot,
    ) -> Vec<&'a Node> {
        snapshot
            .iter()
            .filter(|node| self.match_node(service, namespace, node).is_some())
            .collect()
    }

    /// Decides whether a single node matches.
    #[must_use]
    pub fn match_node(&self, service: &str, namespace: &str, node: &Node) -> Option<MatchReason> {
        if !node.online || service.is_empty() {
            return None;
        }

        match self.strategy {
            MatchStrategy::NameOnly => name_matches(service, node).then_some(MatchReason::Name),
            MatchStrategy::TagsOnly => {
                tags_match(service, namespace, node).then_some(MatchReason::Tags)
            }
            MatchStrategy::TagsThenName => {
                if node.service_tag().is_some() {
                    tags_match(service, namespace, node).then_some(MatchReason::Tags)
                } else {
                    name_matches(service, node).then_some(MatchReason::Name)
                }
            }
        }
    }
}

fn tags_match(service: &str, namespace: &str, node: &Node) -> bool {
    let Some(tagged_service) = node.service_tag() else {
        return false;
    };
    if !tagged_service.eq_ignore_ascii_case(service) {
        return false;
    }
    node.namespace_tag()
        .is_none_or(|tagged_namespace| tagged_namespace.eq_ignore_ascii_case(namespace))
}

fn name_matches(service: &str, node: &Node) -> bool {
    node.name.to_lowercase().contains(&service.to_lowercase())
}
