//! The status sink collaborator contract.
//!
//! The orchestrator requires a status object it can push request handles
//! and milestone notifications into; delivery mechanism (direct calls,
//! channels, an event bus) is entirely up to the implementation. The
//! concrete, production-usable implementation this crate ships
//! (`InMemoryStatusSink`) lives in `dispatch-runtime`, since it needs a
//! concrete async runtime to back its watcher fan-out; only the contract
//! lives here.

use async_trait::async_trait;
use uuid::Uuid;

use crate::request::{BuildResult, BuildStatus};

/// Time-ordered identifier for a `BuildSet`, used as a `tracing` span
/// correlation field and as the key a host registry would use to look a
/// set up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SetId(Uuid);

impl SetId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set-level rolling result. Uses the same discriminants as
/// [`BuildResult`] — a `BuildSet`'s overall verdict is drawn from the same
/// result space as an individual request's.
pub type BuildSetResult = BuildResult;

/// The status-reporting collaborator a [`BuildSet`](crate) orchestrator
/// pushes request handles and milestone notifications into.
///
/// All methods are invoked from the orchestrator's single logical
/// execution context and must not block that context for long;
/// implementations that need to do expensive work (persistence, network
/// calls to a dashboard) should hand off to a background task.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Register every request's status handle, in submission order
    /// (simultaneous mode) or chain-flattened order (ordered mode).
    fn set_request_statuses(&self, statuses: Vec<BuildStatus>);

    /// Record the set's rolling result.
    fn set_results(&self, result: BuildSetResult);

    /// Called exactly once, the moment `still-hopeful` flips to false.
    fn give_up_hope(&self);

    /// Notify every success watcher. Fired once when the set is known to
    /// have failed, and again (unconditionally) when the set finishes if
    /// it never failed.
    fn notify_success_watchers(&self);

    /// Notify every finished watcher. Fired exactly once, after the last
    /// outstanding request completes.
    fn notify_finished_watchers(&self);

    /// Resolves with the set's result once either the set has finished, or
    /// it is known the set cannot succeed (whichever comes first).
    async fn wait_until_success(&self) -> BuildSetResult;

    /// Resolves with the set's final result once every request has
    /// finished.
    async fn wait_until_finished(&self) -> BuildSetResult;
}
