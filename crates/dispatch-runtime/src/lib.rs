//! `dispatch-runtime` — concrete orchestration logic for the BuildSet
//! dispatch core: the dependency planner, the ordered-mode chain
//! structure, the async `BuildSet` orchestrator, and the reference
//! `InMemoryStatusSink`.
//!
//! Builds on the contract types in `dispatch-kernel`, per this org's
//! microkernel convention of keeping traits and data types separate from
//! the concrete logic that implements them.

pub mod chain;
pub mod orchestrator;
pub mod planner;
pub mod status_sink;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use chain::{Chain, ChainNode};
pub use orchestrator::{BuildSet, Start};
pub use planner::{Cohort, DependencyMap, ancestors, plan};
pub use status_sink::InMemoryStatusSink;
