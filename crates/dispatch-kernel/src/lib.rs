//! `dispatch-kernel` — the contract layer for the BuildSet dispatch core.
//!
//! Per this org's microkernel convention: trait definitions, the data model,
//! and typed errors live here; concrete orchestration logic (the dependency
//! planner, the chain structure, the async orchestrator, and a reference
//! status-sink implementation) lives in `dispatch-runtime`, which depends on
//! this crate. Nothing in this crate depends on a concrete async runtime
//! beyond the `tokio::sync::watch` completion-signal type used by
//! [`request::BuildRequest`] — `watch` rather than `oneshot` because
//! [`request::BuildStatus`] must be cloned and re-subscribed to by
//! multiple independent observers (the aggregator, a `StatusSink`, test
//! code), which a single-consumer `oneshot` receiver cannot support.

pub mod builder;
pub mod config;
pub mod error;
pub mod properties;
pub mod request;
pub mod source_stamp;
pub mod status;

pub use builder::{Builder, BuilderName};
pub use config::{ExceptionSeverity, OrchestratorConfig, ShortCircuitPolicy};
pub use error::{DispatchError, DispatchResult, OrchestratorError, PlannerError};
pub use properties::Properties;
pub use request::{BuildRequest, BuildResult, BuildStatus, RequestId};
pub use source_stamp::SourceStamp;
pub use status::{BuildSetResult, SetId, StatusSink};
