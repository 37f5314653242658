//! # claw-clusterset
//!
//! Cross-cluster service discovery for `<service>.<namespace>.svc.clusterset.local`
//! names, answered from a cached view of the mesh node directory.
//!
//! - **Node Directory** - Periodically refreshed, immutable snapshots of mesh nodes
//! - **Domain Parsing** - Recognize clusterset-local query names
//! - **Matching** - Select online nodes by tags, falling back to node names
//! - **Record Synthesis** - Turn node addresses into A/AAAA records
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐  list_nodes  ┌──────────────┐  publish  ┌──────────────┐
//! │  Directory   │◀─────────────│     Node     │──────────▶│   Snapshot   │
//! │    Source    │              │  Directory   │           │    Store     │
//! └──────────────┘              └──────────────┘           └──────┬───────┘
//!                                                                  │ load
//!        query name ┌──────────┐   ┌─────────┐   ┌─────────────┐  │
//!       ───────────▶│  Domain  │──▶│ Matcher │──▶│   Record    │◀─┘
//!                   │  Parser  │   └─────────┘   │ Synthesizer │
//!                   └──────────┘                 └─────────────┘
//! ```
//!
//! Queries never wait on the control plane. The directory refreshes in the
//! background and readers always see one complete snapshot.
//!
//! ## Quick Start
//!
//! ```rust
//! use claw_clusterset::parse_clusterset_name;
//!
//! let parsed = parse_clusterset_name("web.default.svc.clusterset.local.");
//! assert!(parsed.valid);
//! assert_eq!(parsed.service, "web");
//! assert_eq!(parsed.namespace, "default");
//!
//! assert!(!parse_clusterset_name("web.default.svc.cluster.local").valid);
//! ```
//!
//! ## Resolving
//!
//! ```rust
//! use std::sync::Arc;
//! use claw_clusterset::{
//!     DirectoryConfig, FakeDirectorySource, Node, NodeDirectory, RecordType, ResolverConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
//! let source = FakeDirectorySource::with_nodes(vec![
//!     Node::builder("node1", "web-service.default")
//!         .address("10.0.0.1")
//!         .address("fd11::1")
//!         .build(),
//! ]);
//! let directory = Arc::new(NodeDirectory::new(source, DirectoryConfig::default()));
//! directory.refresh(&CancellationToken::new()).await.expect("refresh");
//!
//! let resolver = directory.resolver(&ResolverConfig::default());
//! let answer = resolver.resolve("web.default.svc.clusterset.local").expect("ready");
//! assert_eq!(answer.records_of(RecordType::A).count(), 1);
//! assert_eq!(answer.records_of(RecordType::Aaaa).count(), 1);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod matcher;
pub mod node;
pub mod records;
pub mod resolver;
pub mod snapshot;
pub mod source;

// Re-export main types for convenience
pub use config::{DirectoryConfig, MatchStrategy, ResolverConfig, SuffixCase};
pub use directory::{NodeDirectory, RefreshStats, RefreshTask};
pub use domain::{DomainParser, ParsedQuery, normalize_query_name, parse_clusterset_name};
pub use error::{ClustersetError, Result, SourceError};
pub use matcher::{MatchReason, Matcher};
pub use node::{AddressFamily, Node, NodeAddress, NodeBuilder, NodeFilter};
pub use records::{AddressRecord, RecordSynthesizer, RecordType, Synthesis};
pub use resolver::{Resolution, Resolver, ResolverState};
pub use snapshot::{
    Clock, DirectorySnapshot, LockedSnapshotStore, ManualClock, SnapshotStore, SystemClock,
};
pub use source::{DirectorySource, FakeDirectorySource, FakeSourceError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
