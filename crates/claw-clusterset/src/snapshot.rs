//! Immutable directory snapshots and the store that publishes them.
//!
//! Readers take an `Arc` to the current snapshot and keep using it for as long
//! as they need; a refresh publishes a new snapshot and never mutates an old
//! one. The old snapshot is freed when the last reader drops its `Arc`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::warn;

use crate::node::Node;

/// A point-in-time view of every node the directory knows about.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    version: u64,
    fetched_at: DateTime<Utc>,
    next_refresh_at: DateTime<Utc>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl DirectorySnapshot {
    /// Builds a snapshot from nodes in the order the source returned them.
    ///
    /// Nodes without addresses and nodes repeating an earlier id are dropped.
    #[must_use]
    pub fn new(
        version: u64,
        fetched_at: DateTime<Utc>,
        next_refresh_at: DateTime<Utc>,
        nodes: Vec<Node>,
    ) -> Self {
        let mut kept = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if !node.has_addresses() {
                warn!(node_id = %node.id, name = %node.name, "Dropping node without addresses");
                continue;
            }
            match index.entry(node.id.clone()) {
                Entry::Occupied(_) => {
                    warn!(node_id = %node.id, name = %node.name, "Dropping node with duplicate id");
                }
                Entry::Vacant(slot) => {
                    slot.insert(kept.len());
                    kept.push(node);
                }
            }
        }

        Self {
            version,
            fetched_at,
            next_refresh_at,
            nodes: kept,
            index,
        }
    }

    /// Returns the snapshot renumbered to `version`.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Monotonic sequence number, starting at 1 for the first refresh.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the nodes were fetched.
    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// When the next refresh is due.
    ///
    /// Follows the background refresh schedule when one is running; otherwise
    /// it is `fetched_at` plus the refresh interval.
    #[must_use]
    pub fn next_refresh_at(&self) -> DateTime<Utc> {
        self.next_refresh_at
    }

    /// Nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Iterates nodes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the snapshot holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes currently online.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.online).count()
    }
}

impl<'a> IntoIterator for &'a DirectorySnapshot {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Holds the current snapshot.
///
/// `load` must never block on I/O and must never observe a partially built
/// snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Returns the current snapshot, or `None` before the first publish.
    fn load(&self) -> Option<Arc<DirectorySnapshot>>;

    /// Replaces the current snapshot.
    fn publish(&self, snapshot: Arc<DirectorySnapshot>);

    /// Numbers `snapshot` one past the current version (1 when empty) and
    /// publishes it. Reading the current version and replacing it is atomic,
    /// so writers sharing a store never reuse a version.
    fn publish_next(&self, snapshot: DirectorySnapshot) -> Arc<DirectorySnapshot>;
}

/// [`SnapshotStore`] backed by a read-write lock around an `Arc`.
///
/// The lock is only held long enough to clone or swap the pointer.
#[derive(Debug, Default)]
pub struct LockedSnapshotStore {
    current: RwLock<Option<Arc<DirectorySnapshot>>>,
}

impl LockedSnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for LockedSnapshotStore {
    fn load(&self) -> Option<Arc<DirectorySnapshot>> {
        self.current.read().clone()
    }

    fn publish(&self, snapshot: Arc<DirectorySnapshot>) {
        *self.current.write() = Some(snapshot);
    }

    fn publish_next(&self, snapshot: DirectorySnapshot) -> Arc<DirectorySnapshot> {
        let mut current = self.current.write();
        let version = current.as_ref().map_or(1, |previous| previous.version() + 1);
        let snapshot = Arc::new(snapshot.with_version(version));
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }
}

/// Source of wall-clock time for snapshot timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    /// Sets the clock to `to`.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn node(id: &str, name: &str) -> Node {
        Node::builder(id, name).address("10.0.0.1").build()
    }

    fn snapshot(version: u64, nodes: Vec<Node>) -> DirectorySnapshot {
        DirectorySnapshot::new(version, t0(), t0() + chrono::Duration::seconds(30), nodes)
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let snap = snapshot(1, vec![node("c", "c"), node("a", "a"), node("b", "b")]);

        let ids: Vec<&str> = snap.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_snapshot_lookup_by_id() {
        let snap = snapshot(1, vec![node("n1", "web"), node("n2", "api")]);

        assert_eq!(snap.get("n2").map(|n| n.name.as_str()), Some("api"));
        assert!(snap.get("n3").is_none());
    }

    #[test]
    fn test_snapshot_drops_nodes_without_addresses() {
        let empty = Node::builder("bare", "bare").build();
        let snap = snapshot(1, vec![node("n1", "web"), empty]);

        assert_eq!(snap.len(), 1);
        assert!(snap.get("bare").is_none());
    }

    #[test]
    fn test_snapshot_keeps_first_duplicate() {
        let snap = snapshot(1, vec![node("n1", "first"), node("n1", "second")]);

        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("n1").map(|n| n.name.as_str()), Some("first"));
    }

    #[test]
    fn test_snapshot_metadata() {
        let offline = Node::builder("n2", "db").address("10.0.0.3").online(false).build();
        let snap = snapshot(7, vec![node("n1", "web"), offline]);

        assert_eq!(snap.version(), 7);
        assert_eq!(snap.fetched_at(), t0());
        assert_eq!(snap.next_refresh_at() - snap.fetched_at(), chrono::Duration::seconds(30));
        assert_eq!(snap.online_count(), 1);
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = snapshot(1, Vec::new());
        assert!(snap.is_empty());
        assert_eq!((&snap).into_iter().count(), 0);
    }

    #[test]
    fn test_store_starts_empty() {
        let store = LockedSnapshotStore::new();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_store_publish_replaces_current() {
        let store = LockedSnapshotStore::new();

        store.publish(Arc::new(snapshot(1, vec![node("a", "a")])));
        let held = store.load().expect("published");

        store.publish(Arc::new(snapshot(2, Vec::new())));

        // A reader holding the old snapshot still sees it unchanged.
        assert_eq!(held.version(), 1);
        assert_eq!(held.len(), 1);
        assert_eq!(store.load().map(|s| s.version()), Some(2));
    }

    #[test]
    fn test_publish_next_numbers_from_current() {
        let store = LockedSnapshotStore::new();

        let first = store.publish_next(snapshot(0, vec![node("a", "a")]));
        assert_eq!(first.version(), 1);

        store.publish(Arc::new(snapshot(41, Vec::new())));
        let next = store.publish_next(snapshot(0, Vec::new()));
        assert_eq!(next.version(), 42);
        assert!(store.load().is_some_and(|s| Arc::ptr_eq(&s, &next)));
    }

    #[test]
    fn test_publish_next_from_many_threads_never_reuses_a_version() {
        let store = Arc::new(LockedSnapshotStore::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.publish_next(snapshot(0, Vec::new())).version())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut versions: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("join"))
            .collect();
        versions.sort_unstable();
        assert_eq!(versions, (1..=400).collect::<Vec<_>>());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        assert_eq!(clock.now(), t0());

        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now(), t0() + chrono::Duration::seconds(90));

        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
