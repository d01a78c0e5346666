//! Test-only `Builder` implementations for exercising the orchestrator
//! without a real build farm.
//!
//! Gated behind `#[cfg(test)]` within this crate and behind the
//! `test-support` feature for downstream crates that want to write their
//! own orchestrator-level tests against the same fixtures.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use dispatch_kernel::builder::{Builder, BuilderName};
use dispatch_kernel::request::{BuildRequest, BuildResult};

/// A builder driven entirely by hand: `submit_build_request` enqueues the
/// request, and the test completes them one at a time, in submission
/// order, via [`complete_next`](Self::complete_next).
pub struct MockBuilder {
    name: BuilderName,
    queue: Mutex<VecDeque<BuildRequest>>,
}

impl MockBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: BuilderName::new(name.into()),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of requests submitted but not yet completed.
    pub fn pending_count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Complete the oldest pending request with `result`.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending request — a test driving a
    /// `MockBuilder` is expected to know exactly how many submissions it
    /// triggered.
    pub fn complete_next(&self, result: BuildResult) {
        let request = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockBuilder::complete_next called with no pending request");
        request
            .complete(result)
            .expect("request was already completed");
    }
}

impl Builder for MockBuilder {
    fn name(&self) -> &BuilderName {
        &self.name
    }

    fn submit_build_request(&self, request: BuildRequest) {
        self.queue.lock().unwrap().push_back(request);
    }
}

/// A builder that completes every submitted request on its own, after an
/// optional delay, following a fixed script. Requests beyond the script's
/// length complete immediately with [`BuildResult::Success`].
pub struct ScriptedBuilder {
    name: BuilderName,
    script: Mutex<VecDeque<(Option<Duration>, BuildResult)>>,
}

impl ScriptedBuilder {
    pub fn new(name: impl Into<String>, script: Vec<(Option<Duration>, BuildResult)>) -> Self {
        Self {
            name: BuilderName::new(name.into()),
            script: Mutex::new(script.into()),
        }
    }

    /// A builder that always immediately completes with `result`.
    pub fn always(name: impl Into<String>, result: BuildResult) -> Self {
        Self::new(name, vec![(None, result)])
    }
}

impl Builder for ScriptedBuilder {
    fn name(&self) -> &BuilderName {
        &self.name
    }

    fn submit_build_request(&self, request: BuildRequest) {
        let (delay, result) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((None, BuildResult::Success));
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let _ = request.complete(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_builder_completes_in_submission_order() {
        let builder = MockBuilder::new("A");
        let r1 = BuildRequest::new(
            "t",
            dispatch_kernel::source_stamp::SourceStamp::revision("x").shared(),
            BuilderName::new("A"),
            dispatch_kernel::properties::Properties::new(),
        );
        let r2 = BuildRequest::new(
            "t",
            dispatch_kernel::source_stamp::SourceStamp::revision("x").shared(),
            BuilderName::new("A"),
            dispatch_kernel::properties::Properties::new(),
        );
        builder.submit_build_request(r1.clone());
        builder.submit_build_request(r2.clone());
        assert_eq!(builder.pending_count(), 2);

        builder.complete_next(BuildResult::Success);
        assert_eq!(builder.pending_count(), 1);
    }

    #[tokio::test]
    async fn scripted_builder_auto_completes() {
        let builder =
            ScriptedBuilder::always("A", BuildResult::Warnings);
        let req = BuildRequest::new(
            "t",
            dispatch_kernel::source_stamp::SourceStamp::revision("x").shared(),
            BuilderName::new("A"),
            dispatch_kernel::properties::Properties::new(),
        );
        builder.submit_build_request(req.clone());
        assert_eq!(req.wait_until_finished().await, BuildResult::Warnings);
    }
}
