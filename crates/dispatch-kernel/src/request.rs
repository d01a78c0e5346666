//! [`BuildRequest`] — one unit of work dispatched to one builder.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use uuid::Uuid;

use crate::builder::BuilderName;
use crate::config::ExceptionSeverity;
use crate::properties::Properties;
use crate::source_stamp::SourceStamp;

/// Time-ordered identifier for a [`BuildRequest`], generated with
/// `uuid::Uuid::now_v7` so requests sort chronologically wherever they are
/// logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal result of a [`BuildRequest`].
///
/// Discriminants are wire-stable: `FAILURE` must remain distinguishable
/// from every other variant and `SUCCESS` remains the default aggregate
/// when no request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum BuildResult {
    Success = 0,
    Warnings = 1,
    Failure = 2,
    Skipped = 3,
    Exception = 4,
}

impl BuildResult {
    /// Relative severity used when escalating a `BuildSet`'s rolling result
    /// among non-`FAILURE` outcomes, honoring the [`ExceptionSeverity`]
    /// policy knob. This is the single source of truth for that ordering;
    /// the orchestrator's aggregator calls this rather than re-deriving it.
    ///
    /// # Panics
    ///
    /// Panics if called with `BuildResult::Failure` — `FAILURE` is handled
    /// separately by the aggregator (it always wins, regardless of
    /// `policy`) and is never compared here.
    pub fn severity(self, policy: ExceptionSeverity) -> u8 {
        match (self, policy) {
            (BuildResult::Success, _) => 0,
            (BuildResult::Skipped, _) => 1,
            (BuildResult::Exception, ExceptionSeverity::WarningsOutrankException) => 2,
            (BuildResult::Warnings, ExceptionSeverity::WarningsOutrankException) => 3,
            (BuildResult::Warnings, ExceptionSeverity::ExceptionOutranksWarnings) => 2,
            (BuildResult::Exception, ExceptionSeverity::ExceptionOutranksWarnings) => 3,
            (BuildResult::Failure, _) => {
                unreachable!("FAILURE is handled by the caller, not compared by severity")
            }
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, BuildResult::Failure)
    }
}

/// A read-only, subscribable handle onto a [`BuildRequest`]'s terminal
/// result. This is what gets registered with a [`StatusSink`](crate::status::StatusSink)
/// via `SetRequestStatuses`.
#[derive(Clone)]
pub struct BuildStatus {
    rx: watch::Receiver<Option<BuildResult>>,
}

impl BuildStatus {
    /// The result, if the request has reached a terminal state.
    pub fn get_results(&self) -> Option<BuildResult> {
        *self.rx.borrow()
    }
}

struct RequestInner {
    tx: watch::Sender<Option<BuildResult>>,
    completed: AtomicBool,
}

/// Per-builder unit of work: reason, source, builder name, and a snapshot
/// of the properties bag, plus a status handle and completion signal.
///
/// Created by the orchestrator before any submission; submitted at most
/// once; reaches a terminal result exactly once.
#[derive(Clone)]
pub struct BuildRequest {
    pub id: RequestId,
    pub reason: Arc<str>,
    pub source: Arc<SourceStamp>,
    pub builder_name: BuilderName,
    pub properties: Properties,
    inner: Arc<RequestInner>,
}

impl BuildRequest {
    /// Construct a new, not-yet-submitted request.
    pub fn new(
        reason: impl Into<Arc<str>>,
        source: Arc<SourceStamp>,
        builder_name: BuilderName,
        properties: Properties,
    ) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            id: RequestId::new(),
            reason: reason.into(),
            source,
            builder_name,
            properties,
            inner: Arc::new(RequestInner {
                tx,
                completed: AtomicBool::new(false),
            }),
        }
    }

    /// A status handle for this request. Cheap to clone; every clone
    /// observes the same terminal result.
    pub fn status(&self) -> BuildStatus {
        BuildStatus {
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Deliver the terminal result for this request. Idempotent calls
    /// beyond the first are rejected — a `BuildRequest` reaches a terminal
    /// result exactly once.
    ///
    /// Invoked by a `Builder` collaborator (or, in tests, by the mock
    /// builder) once the underlying build slave has finished.
    pub fn complete(&self, result: BuildResult) -> Result<(), AlreadyCompleted> {
        if self.inner.completed.swap(true, Ordering::SeqCst) {
            return Err(AlreadyCompleted);
        }
        // `send` only fails if every receiver was dropped, which is a
        // legitimate race (nobody is awaiting this request any more) and
        // not a bug in this crate, so it is not propagated as an error.
        let _ = self.inner.tx.send(Some(result));
        Ok(())
    }

    /// The completion signal: resolves once this request reaches a
    /// terminal result.
    pub async fn wait_until_finished(&self) -> BuildResult {
        let mut rx = self.inner.tx.subscribe();
        loop {
            if let Some(result) = *rx.borrow() {
                return result;
            }
            if rx.changed().await.is_err() {
                unreachable!("BuildRequest inner sender is held by the request itself");
            }
        }
    }
}

/// Returned by [`BuildRequest::complete`] when a request that has already
/// reached a terminal result is completed again.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("BuildRequest was already completed")]
pub struct AlreadyCompleted;
