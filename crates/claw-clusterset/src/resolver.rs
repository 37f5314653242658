//! Query resolution against the current directory snapshot.

use std::sync::Arc;

use tracing::debug;

use crate::config::ResolverConfig;
use crate::domain::DomainParser;
use crate::error::{ClustersetError, Result};
use crate::matcher::Matcher;
use crate::records::{AddressRecord, RecordSynthesizer, RecordType};
use crate::snapshot::SnapshotStore;

/// Whether the resolver can answer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// No snapshot has been published yet.
    NotReady,
    /// Answering from the current snapshot.
    Ready,
}

/// Answer to a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The name is not a clusterset-local name; another resolver should
    /// answer it.
    NotAuthoritative,
    /// The name is ours. `records` is empty when no online node serves it.
    Authoritative {
        /// Records in node order, then address order.
        records: Vec<AddressRecord>,
    },
}

impl Resolution {
    /// Returns true if the name belongs to the clusterset domain, whether or
    /// not any instance answered.
    #[must_use]
    pub fn found(&self) -> bool {
        matches!(self, Self::Authoritative { .. })
    }

    /// Returns true if at least one record was produced.
    #[must_use]
    pub fn has_records(&self) -> bool {
        !self.records().is_empty()
    }

    /// All records, empty when not authoritative.
    #[must_use]
    pub fn records(&self) -> &[AddressRecord] {
        match self {
            Self::NotAuthoritative => &[],
            Self::Authoritative { records } => records,
        }
    }

    /// Records of one type.
    pub fn records_of(&self, record_type: RecordType) -> impl Iterator<Item = &AddressRecord> {
        self.records()
            .iter()
            .filter(move |r| r.record_type == record_type)
    }

    /// Consumes the resolution and returns its records.
    #[must_use]
    pub fn into_records(self) -> Vec<AddressRecord> {
        match self {
            Self::NotAuthoritative => Vec::new(),
            Self::Authoritative { records } => records,
        }
    }
}

/// Answers clusterset-local queries from published snapshots.
///
/// Resolution is synchronous and never touches the network. Every query reads
/// one snapshot, so a refresh landing mid-query cannot mix two node sets.
pub struct Resolver {
    store: Arc<dyn SnapshotStore>,
    parser: DomainParser,
    matcher: Matcher,
    synthesizer: RecordSynthesizer,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("parser", &self.parser)
            .field("matcher", &self.matcher)
            .field("synthesizer", &self.synthesizer)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates a resolver reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>, config: &ResolverConfig) -> Self {
        Self {
            store,
            parser: DomainParser::new(config.suffix_case),
            matcher: Matcher::new(config.match_strategy),
            synthesizer: RecordSynthesizer::new(config.ttl_secs),
        }
    }

    /// Current readiness.
    #[must_use]
    pub fn state(&self) -> ResolverState {
        if self.store.load().is_some() {
            ResolverState::Ready
        } else {
            ResolverState::NotReady
        }
    }

    /// Resolves `query_name`.
    ///
    /// Before the first published snapshot every query fails with
    /// [`ClustersetError::DirectoryNotReady`], including names outside the
    /// clusterset domain.
    pub fn resolve(&self, query_name: &str) -> Result<Resolution> {
        let snapshot = self.store.load().ok_or(ClustersetError::DirectoryNotReady)?;

        let parsed = self.parser.parse(query_name);
        if !parsed.valid {
            debug!(query = query_name, "Not a clusterset-local name");
            return Ok(Resolution::NotAuthoritative);
        }

        let matched = self
            .matcher
            .matches(&parsed.service, &parsed.namespace, &snapshot);
        let synthesis = self
            .synthesizer
            .synthesize(query_name, matched.iter().copied());

        debug!(
            query = query_name,
            service = %parsed.service,
            namespace = %parsed.namespace,
            snapshot_version = snapshot.version(),
            nodes = matched.len(),
            records = synthesis.records.len(),
            malformed = synthesis.malformed,
            "Resolved clusterset query"
        );

        Ok(Resolution::Authoritative {
            records: synthesis.records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchStrategy, SuffixCase};
    use crate::node::Node;
    use crate::snapshot::{DirectorySnapshot, LockedSnapshotStore};
    use chrono::Utc;
    use std::net::IpAddr;

    fn mesh() -> Vec<Node> {
        vec![
            Node::builder("node1", "web-service.default")
                .address("10.0.0.1")
                .address("fd11::1")
                .build(),
            Node::builder("node2", "api-service.production")
                .address("10.0.0.2")
                .address("fd11::2")
                .build(),
            Node::builder("node3", "database-service.default")
                .address("10.0.0.3")
                .address("fd11::3")
                .online(false)
                .build(),
        ]
    }

    fn store_with(version: u64, nodes: Vec<Node>) -> Arc<LockedSnapshotStore> {
        let store = Arc::new(LockedSnapshotStore::new());
        let now = Utc::now();
        store.publish(Arc::new(DirectorySnapshot::new(version, now, now, nodes)));
        store
    }

    fn resolver(store: Arc<LockedSnapshotStore>) -> Resolver {
        Resolver::new(store, &ResolverConfig::default())
    }

    fn addrs(records: &[AddressRecord]) -> Vec<String> {
        records.iter().map(|r| r.address.to_string()).collect()
    }

    #[test]
    fn test_not_ready_before_publish() {
        let resolver = resolver(Arc::new(LockedSnapshotStore::new()));

        assert_eq!(resolver.state(), ResolverState::NotReady);
        assert!(matches!(
            resolver.resolve("web.default.svc.clusterset.local"),
            Err(ClustersetError::DirectoryNotReady)
        ));
        // Readiness is checked before the name.
        assert!(matches!(
            resolver.resolve("example.com"),
            Err(ClustersetError::DirectoryNotReady)
        ));
    }

    #[test]
    fn test_resolves_web_default() {
        let resolver = resolver(store_with(1, mesh()));
        assert_eq!(resolver.state(), ResolverState::Ready);

        let resolution = resolver
            .resolve("web.default.svc.clusterset.local.")
            .expect("ready");

        assert!(resolution.found());
        assert!(resolution.has_records());
        assert_eq!(addrs(resolution.records()), vec!["10.0.0.1", "fd11::1"]);
        assert!(
            resolution
                .records()
                .iter()
                .all(|r| r.ttl == 30 && r.name == "web.default.svc.clusterset.local.")
        );
    }

    #[test]
    fn test_records_of_type() {
        let resolver = resolver(store_with(1, mesh()));
        let resolution = resolver
            .resolve("api.production.svc.clusterset.local")
            .expect("ready");

        let v4: Vec<IpAddr> = resolution.records_of(RecordType::A).map(|r| r.address).collect();
        let v6: Vec<IpAddr> = resolution
            .records_of(RecordType::Aaaa)
            .map(|r| r.address)
            .collect();

        assert_eq!(v4, vec!["10.0.0.2".parse::<IpAddr>().expect("ip")]);
        assert_eq!(v6, vec!["fd11::2".parse::<IpAddr>().expect("ip")]);
    }

    #[test]
    fn test_offline_service_is_authoritative_empty() {
        let resolver = resolver(store_with(1, mesh()));

        let resolution = resolver
            .resolve("database.default.svc.clusterset.local")
            .expect("ready");

        assert!(resolution.found());
        assert!(!resolution.has_records());
    }

    #[test]
    fn test_empty_snapshot_is_authoritative_empty() {
        let resolver = resolver(store_with(1, Vec::new()));
        assert_eq!(resolver.state(), ResolverState::Ready);

        for name in ["web.default.svc.clusterset.local", "x.y.svc.clusterset.local."] {
            let resolution = resolver.resolve(name).expect("ready");
            assert!(resolution.found());
            assert!(resolution.records().is_empty());
        }
    }

    #[test]
    fn test_foreign_name_is_not_authoritative() {
        let resolver = resolver(store_with(1, mesh()));

        for name in ["example.com.", "web.default.svc.cluster.local", "svc.clusterset.local"] {
            let resolution = resolver.resolve(name).expect("ready");
            assert_eq!(resolution, Resolution::NotAuthoritative);
            assert!(!resolution.found());
            assert!(resolution.records().is_empty());
        }
    }

    #[test]
    fn test_respects_configured_policy() {
        let config = ResolverConfig {
            ttl_secs: 5,
            match_strategy: MatchStrategy::NameOnly,
            suffix_case: SuffixCase::IgnoreAsciiCase,
        };
        let resolver = Resolver::new(store_with(1, mesh()), &config);

        let records = resolver
            .resolve("WEB.default.SVC.CLUSTERSET.LOCAL")
            .expect("ready")
            .into_records();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.ttl == 5));
    }

    #[test]
    fn test_sees_newly_published_snapshot() {
        let store = store_with(1, mesh());
        let resolver = resolver(Arc::clone(&store));
        assert!(
            !resolver
                .resolve("cache.default.svc.clusterset.local")
                .expect("ready")
                .has_records()
        );

        let now = Utc::now();
        let mut nodes = mesh();
        nodes.push(Node::builder("node4", "cache-service.default").address("10.0.0.4").build());
        store.publish(Arc::new(DirectorySnapshot::new(2, now, now, nodes)));

        let resolution = resolver
            .resolve("cache.default.svc.clusterset.local")
            .expect("ready");
        assert_eq!(addrs(resolution.records()), vec!["10.0.0.4"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_share_snapshot() {
        let resolver = Arc::new(resolver(store_with(1, mesh())));

        let queries = (0..32).map(|i| {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move {
                let name = if i % 2 == 0 {
                    "web.default.svc.clusterset.local"
                } else {
                    "api.production.svc.clusterset.local"
                };
                resolver.resolve(name).map(|r| r.records().len())
            })
        });

        for result in futures::future::join_all(queries).await {
            assert_eq!(result.expect("join").expect("ready"), 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_during_refresh_see_one_node_set() {
        use crate::config::DirectoryConfig;
        use crate::directory::NodeDirectory;
        use crate::source::FakeDirectorySource;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;
        use tokio_util::sync::CancellationToken;

        fn generation(v4: &str, v6: &str) -> Vec<Node> {
            vec![Node::builder("web", "web-service.default").address(v4).address(v6).build()]
        }
        let blue = generation("10.0.0.1", "fd11::1");
        let green = generation("10.0.1.1", "fd11:1::1");

        let source = FakeDirectorySource::with_nodes(blue.clone());
        source.set_delay(Duration::from_millis(1));
        let directory = Arc::new(NodeDirectory::new(source.clone(), DirectoryConfig::default()));
        let cancel = CancellationToken::new();
        directory.refresh(&cancel).await.expect("refresh");

        let resolver = Arc::new(directory.resolver(&ResolverConfig::default()));
        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let done = Arc::clone(&done);
                tokio::spawn(async move {
                    let mut answers = 0u64;
                    while !done.load(Ordering::Acquire) {
                        let records = resolver
                            .resolve("web.default.svc.clusterset.local")
                            .expect("ready")
                            .into_records();
                        let got = addrs(&records);
                        assert!(
                            got == ["10.0.0.1", "fd11::1"] || got == ["10.0.1.1", "fd11:1::1"],
                            "mixed answer {got:?}"
                        );
                        answers += 1;
                        tokio::task::yield_now().await;
                    }
                    answers
                })
            })
            .collect();

        for round in 0..40 {
            source.set_nodes(if round % 2 == 0 { green.clone() } else { blue.clone() });
            directory.refresh(&cancel).await.expect("refresh");
        }
        done.store(true, Ordering::Release);

        for reader in futures::future::join_all(readers).await {
            assert!(reader.expect("join") > 0);
        }
        assert_eq!(directory.current().expect("ready").version(), 41);
    }
}
