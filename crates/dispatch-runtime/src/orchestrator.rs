//! The `BuildSet` orchestrator: dispatches one `BuildRequest` per builder,
//! either all at once (simultaneous mode) or cohort-by-cohort following a
//! dependency plan (ordered mode), and aggregates every request's result
//! into a single rolling verdict.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use error_stack::Report;
use tokio::sync::Mutex;
use tracing::{Instrument, info, info_span, warn};

use dispatch_kernel::builder::{Builder, BuilderName};
use dispatch_kernel::config::{OrchestratorConfig, ShortCircuitPolicy};
use dispatch_kernel::error::{DispatchError, DispatchResult, OrchestratorError};
use dispatch_kernel::properties::Properties;
use dispatch_kernel::request::{BuildRequest, BuildResult, RequestId};
use dispatch_kernel::source_stamp::SourceStamp;
use dispatch_kernel::status::{BuildSetResult, SetId, StatusSink};

use crate::chain::Chain;
use crate::planner::{self, DependencyMap};

/// How a `BuildSet` should submit its builders.
pub enum Start {
    /// Submit every builder's request at once. No ordering is implied or
    /// enforced between them.
    Simultaneous(Vec<Arc<dyn Builder>>),
    /// Submit builders cohort-by-cohort, per `prerequisites`. A builder
    /// absent from `prerequisites` as a key is treated as having no
    /// prerequisites.
    Ordered {
        builders: Vec<Arc<dyn Builder>>,
        prerequisites: DependencyMap,
    },
}

struct State {
    outstanding: HashSet<RequestId>,
    still_hopeful: bool,
    /// The most severe result observed so far among non-`FAILURE`
    /// completions, or `Some(Failure)` once the set has failed. `None`
    /// until the first request completes.
    result: Option<BuildSetResult>,
}

/// One dispatch unit: a set of `BuildRequest`s created from a shared
/// `SourceStamp`, reason and properties bag, submitted to one or more
/// builders and aggregated into a single rolling result.
///
/// Always held behind an `Arc`, since its completion callbacks are driven
/// from spawned tasks that outlive any single call into its methods.
pub struct BuildSet {
    id: SetId,
    source: Arc<SourceStamp>,
    reason: Arc<str>,
    properties: Properties,
    config: OrchestratorConfig,
    status: Arc<dyn StatusSink>,
    state: Mutex<State>,
    started: AtomicBool,
}

impl BuildSet {
    /// Construct a new, not-yet-started `BuildSet`.
    pub fn new(
        source: Arc<SourceStamp>,
        reason: impl Into<Arc<str>>,
        properties: Properties,
        status: Arc<dyn StatusSink>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SetId::new(),
            source,
            reason: reason.into(),
            properties,
            config,
            status,
            state: Mutex::new(State {
                outstanding: HashSet::new(),
                still_hopeful: true,
                result: None,
            }),
            started: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> SetId {
        self.id
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Submit this set's builders per `mode`. May only be called once;
    /// subsequent calls return [`OrchestratorError::AlreadyStarted`].
    pub async fn start(self: &Arc<Self>, mode: Start) -> DispatchResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Report::new(DispatchError::from(OrchestratorError::AlreadyStarted)));
        }

        let span = info_span!("build_set", set_id = %self.id);

        let result = match mode {
            Start::Simultaneous(builders) => {
                run_simultaneous(self.clone(), builders).instrument(span).await
            }
            Start::Ordered {
                builders,
                prerequisites,
            } => {
                run_ordered(self.clone(), builders, prerequisites)
                    .instrument(span)
                    .await
            }
        };

        result.map_err(|e| Report::new(DispatchError::from(e)))
    }

    /// Resolves once the set is known either to have succeeded fully or to
    /// have lost all hope of succeeding, whichever comes first.
    pub async fn wait_until_success(&self) -> BuildSetResult {
        self.status.wait_until_success().await
    }

    /// Resolves once every request in the set has reached a terminal
    /// result.
    pub async fn wait_until_finished(&self) -> BuildSetResult {
        self.status.wait_until_finished().await
    }

    async fn register_outstanding(&self, ids: impl IntoIterator<Item = RequestId>) {
        let mut state = self.state.lock().await;
        state.outstanding.extend(ids);
    }

    /// The aggregator: invoked once per request, the moment that request
    /// reaches a terminal result. Mirrors the upstream `requestFinished`
    /// callback this design is modeled on.
    async fn aggregate(self: &Arc<Self>, request_id: RequestId, result: BuildResult) {
        let mut state = self.state.lock().await;
        state.outstanding.remove(&request_id);

        if result.is_failure() {
            if state.still_hopeful {
                state.still_hopeful = false;
                state.result = Some(BuildResult::Failure);
                self.status.set_results(BuildResult::Failure);
                self.status.give_up_hope();
                self.status.notify_success_watchers();
                warn!(set_id = %self.id, %request_id, "hope lost: a request failed");
            }
        } else if state.still_hopeful {
            let candidate_severity = result.severity(self.config.exception_severity);
            let current_severity = state
                .result
                .map(|r| r.severity(self.config.exception_severity))
                .unwrap_or(0);
            if state.result.is_none() || candidate_severity > current_severity {
                state.result = Some(result);
            }
        }

        if state.outstanding.is_empty() {
            if state.still_hopeful {
                let final_result = state.result.unwrap_or(BuildResult::Success);
                state.result = Some(final_result);
                self.status.set_results(final_result);
                self.status.notify_success_watchers();
            }
            drop(state);
            self.status.notify_finished_watchers();
            info!(set_id = %self.id, "all outstanding requests finished");
        }
    }

    async fn is_still_hopeful(&self) -> bool {
        self.state.lock().await.still_hopeful
    }
}

async fn run_simultaneous(
    this: Arc<BuildSet>,
    builders: Vec<Arc<dyn Builder>>,
) -> Result<(), OrchestratorError> {
    if builders.is_empty() {
        return Err(OrchestratorError::EmptyBuilderSet);
    }

    let requests: Vec<BuildRequest> = builders
        .iter()
        .map(|b| {
            BuildRequest::new(
                this.reason.clone(),
                this.source.clone(),
                b.name().clone(),
                this.properties.snapshot(),
            )
        })
        .collect();

    this.register_outstanding(requests.iter().map(|r| r.id))
        .await;
    this.status
        .set_request_statuses(requests.iter().map(BuildRequest::status).collect());

    for req in &requests {
        spawn_aggregator(this.clone(), req.clone());
    }
    for (builder, req) in builders.iter().zip(requests.iter()) {
        builder.submit_build_request(req.clone());
    }

    Ok(())
}

async fn run_ordered(
    this: Arc<BuildSet>,
    builders: Vec<Arc<dyn Builder>>,
    prerequisites: DependencyMap,
) -> Result<(), OrchestratorError> {
    if builders.is_empty() {
        return Err(OrchestratorError::EmptyBuilderSet);
    }

    let builder_by_name: HashMap<BuilderName, Arc<dyn Builder>> = builders
        .into_iter()
        .map(|b| (b.name().clone(), b))
        .collect();

    let mut dep = prerequisites;
    for name in builder_by_name.keys() {
        dep.entry(name.clone()).or_default();
    }
    let cohorts = planner::plan(&dep)?;

    // `dep`'s values may name a builder that was never actually passed to
    // `Start` (a typo, or one the caller forgot to include) — `plan` has
    // no way to tell the difference between a real builder and a dangling
    // dependency name, so the cohorts it emits are checked against the
    // builders we actually have before any `BuildRequest` is created.
    let mut unknown: Vec<String> = cohorts
        .iter()
        .flatten()
        .filter(|name| !builder_by_name.contains_key(*name))
        .map(|name| name.as_str().to_string())
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        unknown.dedup();
        return Err(OrchestratorError::UnknownBuilder(unknown));
    }

    let mut requests_by_builder: HashMap<BuilderName, BuildRequest> = HashMap::new();
    for name in builder_by_name.keys() {
        requests_by_builder.insert(
            name.clone(),
            BuildRequest::new(
                this.reason.clone(),
                this.source.clone(),
                name.clone(),
                this.properties.snapshot(),
            ),
        );
    }

    let chain = Arc::new(Chain::build(cohorts, &requests_by_builder));
    if chain.is_empty() {
        return Ok(());
    }

    this.register_outstanding(requests_by_builder.values().map(|r| r.id))
        .await;
    this.status
        .set_request_statuses(chain.flatten_requests().iter().map(BuildRequest::status).collect());

    let builder_by_name = Arc::new(builder_by_name);

    // The head cohort is submitted synchronously, before `start` returns —
    // every later cohort is submitted from a background continuation once
    // the chain's own `completion_signal` for its predecessor has resolved,
    // i.e. once every request in that cohort has both finished and been
    // folded into the set's rolling result.
    let head_idx = chain.head();
    submit_node(chain.node(head_idx), &builder_by_name);

    let this2 = this.clone();
    let chain2 = chain.clone();
    let builder_by_name2 = builder_by_name.clone();
    tokio::spawn(async move {
        let this3 = this2.clone();
        chain2
            .node(head_idx)
            .completion_signal(move |req, result| {
                let this4 = this3.clone();
                let request_id = req.id;
                async move { this4.aggregate(request_id, result).await }
            })
            .await;
        if let Some(next_idx) = chain2.node(head_idx).next {
            drive_from(this2, chain2, next_idx, builder_by_name2).await;
        }
    });

    Ok(())
}

/// Submit every request in `node` to its builder. Does not itself attach
/// an aggregator — callers drive aggregation through
/// [`crate::chain::ChainNode::completion_signal`].
fn submit_node(node: &crate::chain::ChainNode, builder_by_name: &HashMap<BuilderName, Arc<dyn Builder>>) {
    for req in &node.requests {
        if let Some(builder) = builder_by_name.get(&req.builder_name) {
            builder.submit_build_request(req.clone());
        }
    }
}

fn spawn_aggregator(this: Arc<BuildSet>, req: BuildRequest) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let result = req.wait_until_finished().await;
        this.aggregate(req.id, result).await;
    });
}

/// Drives the chain forward one cohort at a time, starting at `node_idx`,
/// advancing only once the current node's
/// [`completion_signal`](crate::chain::ChainNode::completion_signal) has
/// resolved — the chain's own composite signal for "this cohort is fully
/// aggregated." Under [`ShortCircuitPolicy::StopOnFailure`], once the set
/// is no longer hopeful every remaining cohort is marked `Skipped` instead
/// of being submitted.
async fn drive_from(
    this: Arc<BuildSet>,
    chain: Arc<Chain>,
    mut node_idx: usize,
    builder_by_name: Arc<HashMap<BuilderName, Arc<dyn Builder>>>,
) {
    loop {
        if this.config.short_circuit == ShortCircuitPolicy::StopOnFailure
            && !this.is_still_hopeful().await
        {
            skip_remaining(&this, &chain, Some(node_idx)).await;
            return;
        }

        let node = chain.node(node_idx);
        submit_node(node, &builder_by_name);

        let this2 = this.clone();
        node.completion_signal(move |req, result| {
            let this3 = this2.clone();
            let request_id = req.id;
            async move { this3.aggregate(request_id, result).await }
        })
        .await;

        match chain.node(node_idx).next {
            Some(next_idx) => node_idx = next_idx,
            None => return,
        }
    }
}

async fn skip_remaining(this: &Arc<BuildSet>, chain: &Arc<Chain>, mut node_idx: Option<usize>) {
    while let Some(idx) = node_idx {
        let node = chain.node(idx);
        for req in &node.requests {
            let _ = req.complete(BuildResult::Skipped);
            this.aggregate(req.id, BuildResult::Skipped).await;
        }
        node_idx = node.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_sink::InMemoryStatusSink;
    use crate::testing::MockBuilder;

    fn new_set(config: OrchestratorConfig) -> (Arc<BuildSet>, Arc<InMemoryStatusSink>) {
        let sink = Arc::new(InMemoryStatusSink::new(config.request_channel_capacity));
        let set = BuildSet::new(
            SourceStamp::revision("deadbeef").shared(),
            "unit test",
            Properties::new(),
            sink.clone(),
            config,
        );
        (set, sink)
    }

    #[tokio::test]
    async fn simultaneous_success_aggregates_to_success() {
        let (set, sink) = new_set(OrchestratorConfig::default());
        let a = Arc::new(MockBuilder::new("A"));
        let b = Arc::new(MockBuilder::new("B"));

        set.start(Start::Simultaneous(vec![a.clone(), b.clone()]))
            .await
            .unwrap();

        a.complete_next(BuildResult::Success);
        b.complete_next(BuildResult::Success);

        assert_eq!(sink.wait_until_finished().await, BuildResult::Success);
    }

    #[tokio::test]
    async fn simultaneous_failure_flips_hope_immediately() {
        let (set, sink) = new_set(OrchestratorConfig::default());
        let a = Arc::new(MockBuilder::new("A"));
        let b = Arc::new(MockBuilder::new("B"));

        set.start(Start::Simultaneous(vec![a.clone(), b.clone()]))
            .await
            .unwrap();

        a.complete_next(BuildResult::Failure);
        assert_eq!(sink.wait_until_success().await, BuildResult::Failure);

        b.complete_next(BuildResult::Success);
        assert_eq!(sink.wait_until_finished().await, BuildResult::Failure);
    }

    #[tokio::test]
    async fn exception_does_not_flip_hope() {
        let (set, sink) = new_set(OrchestratorConfig::default());
        let a = Arc::new(MockBuilder::new("A"));

        set.start(Start::Simultaneous(vec![a.clone()])).await.unwrap();
        a.complete_next(BuildResult::Exception);

        assert_eq!(sink.wait_until_finished().await, BuildResult::Exception);
    }

    #[tokio::test]
    async fn empty_builder_set_is_rejected() {
        let (set, _sink) = new_set(OrchestratorConfig::default());
        let err = set.start(Start::Simultaneous(vec![])).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            DispatchError::Orchestrator(OrchestratorError::EmptyBuilderSet)
        ));
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let (set, _sink) = new_set(OrchestratorConfig::default());
        let a = Arc::new(MockBuilder::new("A"));
        set.start(Start::Simultaneous(vec![a.clone()])).await.unwrap();
        let err = set
            .start(Start::Simultaneous(vec![a]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            DispatchError::Orchestrator(OrchestratorError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn ordered_mode_rejects_prerequisite_naming_an_unknown_builder() {
        let (set, _sink) = new_set(OrchestratorConfig::default());
        let a = Arc::new(MockBuilder::new("A"));

        let mut prerequisites = HashMap::new();
        prerequisites.insert(BuilderName::new("A"), vec![BuilderName::new("Ghost")]);

        let err = set
            .start(Start::Ordered {
                builders: vec![a],
                prerequisites,
            })
            .await
            .unwrap_err();
        match err.current_context() {
            DispatchError::Orchestrator(OrchestratorError::UnknownBuilder(names)) => {
                assert_eq!(names, &vec!["Ghost".to_string()])
            }
            other => panic!("expected UnknownBuilder, got {other:?}"),
        }
    }
}
