//! Directory sources.
//!
//! A [`DirectorySource`] lists the nodes currently known to the control plane.
//! The directory calls it on every refresh and never retries within a single
//! refresh; the next scheduled tick is the retry.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::node::{Node, NodeFilter};

/// Lists mesh nodes from a control plane.
pub trait DirectorySource: Send + Sync + 'static {
    /// Error returned when the listing fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every node matching `filter`.
    fn list_nodes(
        &self,
        filter: &NodeFilter,
    ) -> impl Future<Output = Result<Vec<Node>, Self::Error>> + Send;
}

impl<S: DirectorySource> DirectorySource for Arc<S> {
    type Error = S::Error;

    fn list_nodes(
        &self,
        filter: &NodeFilter,
    ) -> impl Future<Output = Result<Vec<Node>, Self::Error>> + Send {
        S::list_nodes(self, filter)
    }
}

/// Error produced by [`FakeDirectorySource`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("fake source failure: {0}")]
pub struct FakeSourceError(pub String);

#[derive(Debug, Default)]
struct FakeState {
    nodes: Vec<Node>,
    failures: VecDeque<String>,
    fail_always: Option<String>,
    delay: Option<Duration>,
    last_filter: Option<NodeFilter>,
}

/// An in-memory directory source for testing.
///
/// Clones share state, so a test can keep one handle while the directory owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct FakeDirectorySource {
    state: Arc<Mutex<FakeState>>,
    calls: Arc<AtomicUsize>,
}

impl FakeDirectorySource {
    /// Creates a source with no nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source serving the given nodes.
    #[must_use]
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let source = Self::new();
        source.set_nodes(nodes);
        source
    }

    /// Replaces the served nodes.
    pub fn set_nodes(&self, nodes: Vec<Node>) {
        self.state.lock().nodes = nodes;
    }

    /// Makes the next listing fail once with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().failures.push_back(message.into());
    }

    /// Makes every listing fail until [`recover`](Self::recover) is called.
    pub fn fail_always(&self, message: impl Into<String>) {
        self.state.lock().fail_always = Some(message.into());
    }

    /// Clears any permanent failure.
    pub fn recover(&self) {
        self.state.lock().fail_always = None;
    }

    /// Delays every listing by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Number of listings served so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The filter passed to the most recent listing.
    #[must_use]
    pub fn last_filter(&self) -> Option<NodeFilter> {
        self.state.lock().last_filter.clone()
    }
}

impl DirectorySource for FakeDirectorySource {
    type Error = FakeSourceError;

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>, FakeSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut state = self.state.lock();
            state.last_filter = Some(filter.clone());
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(message) = state.failures.pop_front() {
            return Err(FakeSourceError(message));
        }
        if let Some(message) = &state.fail_always {
            return Err(FakeSourceError(message.clone()));
        }
        Ok(state.nodes.clone())
    }
}
