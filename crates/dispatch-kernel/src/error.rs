//! Crate-level error types for `dispatch-kernel`.
//!
//! Provides a unified [`DispatchError`] that composes errors from every
//! sub-module (planner, orchestrator, status sink) together with
//! [`error_stack::Report`] for rich, context-carrying error propagation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dispatch_kernel::error::{DispatchError, DispatchResult};
//! use error_stack::ResultExt;
//!
//! fn start_set() -> DispatchResult<()> {
//!     // Errors from sub-modules convert automatically via From impls.
//!     // Attach extra context with .change_context() / .attach().
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Errors raised by the dependency [`planner`](crate) sub-system.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlannerError {
    /// The prerequisite mapping contains a cycle. `remaining` lists the
    /// builders that could not be scheduled into any cohort once every
    /// acyclic portion of the graph had been peeled off.
    #[error("cyclic dependency: no progress possible among {remaining:?}")]
    CyclicDependency { remaining: Vec<String> },

    /// [`Ancestors`](crate) was invoked with an `item` that is not a key of
    /// the prerequisite mapping.
    #[error("unknown builder: {item:?} is not a key in the dependency mapping")]
    UnknownBuilder { item: String },
}

/// Errors raised by the [`BuildSet`](crate) orchestrator at `Start` time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// `Start` was invoked with zero builders.
    #[error("cannot start a BuildSet with an empty builder set")]
    EmptyBuilderSet,

    /// A dependency-planning error surfaced while building ordered mode.
    #[error("dependency planning failed: {0}")]
    Planner(#[from] PlannerError),

    /// `Start` was invoked twice on the same BuildSet.
    #[error("BuildSet has already been started")]
    AlreadyStarted,

    /// Ordered-mode `Start` was invoked with a `prerequisites` map naming a
    /// builder (as a dependency of some other builder) that was not among
    /// the `builders` actually passed to `Start` — a typo, or a builder the
    /// caller forgot to include. Raised before any request is created.
    #[error("unknown builder referenced in prerequisites: {0:?}")]
    UnknownBuilder(Vec<String>),
}

/// Crate-root error type for `dispatch-kernel`.
///
/// Wraps each sub-module's typed error via `#[from]` so that the `?`
/// operator converts them automatically. Use
/// [`error_stack::Report<DispatchError>`] (via [`DispatchResult`]) to attach
/// human-readable context as the error propagates up the call stack.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// An error originating from the dependency planner.
    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    /// An error originating from the orchestrator's `Start` precondition
    /// checks.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// A status-sink-side failure (e.g. a watcher callback panicked, or the
    /// notification channel was dropped before delivery).
    #[error("status sink error: {0}")]
    StatusSink(String),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias using [`error_stack::Report`].
///
/// Equivalent to `Result<T, error_stack::Report<DispatchError>>`.
pub type DispatchResult<T> = Result<T, error_stack::Report<DispatchError>>;
