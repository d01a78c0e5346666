//! The ordered-mode chain structure: a sequence of cohorts, each holding
//! the [`BuildRequest`]s created for the builders planned into it.
//!
//! Modeled as an arena (`Vec<ChainNode>` addressed by index) rather than an
//! owned `Box`-based linked list. A traditional chain has to be built
//! back-to-front so each node can own its already-constructed successor;
//! an arena removes that ordering constraint entirely (`next` is just an
//! index that can point anywhere in the same `Vec`), which is why
//! construction below proceeds front-to-back instead.

use std::collections::HashMap;
use std::future::Future;

use dispatch_kernel::builder::BuilderName;
use dispatch_kernel::request::{BuildRequest, BuildResult};
use futures::future::join_all;

use crate::planner::Cohort;

/// One cohort's worth of requests, plus a link to the next node in the
/// chain (`None` for the chain's tail).
pub struct ChainNode {
    pub cohort: Cohort,
    pub requests: Vec<BuildRequest>,
    pub next: Option<usize>,
}

impl ChainNode {
    /// The composite completion future for this node: resolves once every
    /// request in the cohort has reached a terminal result. `on_complete`
    /// is invoked for each request the moment *that* request finishes —
    /// concurrently with, not after, its cohort-mates — so a caller that
    /// uses it to drive aggregation still observes the first failure
    /// immediately; only the returned future as a whole waits for every
    /// member, which is what lets the orchestrator use it directly to
    /// decide when to advance to the next node.
    pub async fn completion_signal<F, Fut>(&self, on_complete: F)
    where
        F: Fn(&BuildRequest, BuildResult) -> Fut,
        Fut: Future<Output = ()>,
    {
        join_all(self.requests.iter().map(|req| async {
            let result = req.wait_until_finished().await;
            on_complete(req, result).await;
        }))
        .await;
    }
}

/// An immutable chain of cohorts, built once per ordered-mode `Start` and
/// never mutated afterward.
pub struct Chain {
    nodes: Vec<ChainNode>,
    head: usize,
}

impl Chain {
    /// Build a chain from planner output. `requests_by_builder` must
    /// contain exactly one request per builder named anywhere in
    /// `cohorts` — callers are expected to have validated that already
    /// (see `run_ordered` in the orchestrator, which rejects an unknown
    /// builder before this is ever called); the panic below is a last-line
    /// invariant check, not the primary defense.
    pub fn build(
        cohorts: Vec<Cohort>,
        requests_by_builder: &HashMap<BuilderName, BuildRequest>,
    ) -> Self {
        let mut nodes: Vec<ChainNode> = cohorts
            .into_iter()
            .map(|cohort| {
                let requests = cohort
                    .iter()
                    .map(|name| {
                        requests_by_builder
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| panic!("no BuildRequest created for builder {name}"))
                    })
                    .collect();
                ChainNode {
                    cohort,
                    requests,
                    next: None,
                }
            })
            .collect();

        let len = nodes.len();
        for (i, node) in nodes.iter_mut().enumerate() {
            node.next = if i + 1 < len { Some(i + 1) } else { None };
        }

        Self { nodes, head: 0 }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn node(&self, index: usize) -> &ChainNode {
        &self.nodes[index]
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Yield every node from the head to the sentinel, following `next`
    /// links.
    pub fn traverse(&self) -> impl Iterator<Item = &ChainNode> + '_ {
        let mut current = if self.nodes.is_empty() {
            None
        } else {
            Some(self.head)
        };
        std::iter::from_fn(move || {
            let idx = current?;
            let node = &self.nodes[idx];
            current = node.next;
            Some(node)
        })
    }

    /// Every request in the chain, in chain order (cohort-internal order
    /// preserved). Used to register status handles with the `StatusSink`
    /// up front, before any submission.
    pub fn flatten_requests(&self) -> Vec<BuildRequest> {
        self.traverse()
            .flat_map(|n| n.requests.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_kernel::properties::Properties;
    use dispatch_kernel::source_stamp::SourceStamp;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn req(name: &str) -> BuildRequest {
        BuildRequest::new(
            "because",
            SourceStamp::revision("deadbeef").shared(),
            BuilderName::new(name),
            Properties::new(),
        )
    }

    #[test]
    fn build_links_nodes_front_to_back() {
        let cohorts = vec![
            vec![BuilderName::new("A"), BuilderName::new("B")],
            vec![BuilderName::new("C")],
        ];
        let mut by_builder = HashMap::new();
        by_builder.insert(BuilderName::new("A"), req("A"));
        by_builder.insert(BuilderName::new("B"), req("B"));
        by_builder.insert(BuilderName::new("C"), req("C"));

        let chain = Chain::build(cohorts, &by_builder);
        assert_eq!(chain.head(), 0);
        assert_eq!(chain.node(0).requests.len(), 2);
        assert_eq!(chain.node(0).next, Some(1));
        assert_eq!(chain.node(1).requests.len(), 1);
        assert_eq!(chain.node(1).next, None);

        assert_eq!(chain.flatten_requests().len(), 3);
    }

    #[test]
    fn traverse_yields_every_node_from_head_to_sentinel() {
        let cohorts = vec![
            vec![BuilderName::new("A")],
            vec![BuilderName::new("B"), BuilderName::new("C")],
            vec![BuilderName::new("D")],
        ];
        let mut by_builder = HashMap::new();
        by_builder.insert(BuilderName::new("A"), req("A"));
        by_builder.insert(BuilderName::new("B"), req("B"));
        by_builder.insert(BuilderName::new("C"), req("C"));
        by_builder.insert(BuilderName::new("D"), req("D"));

        let chain = Chain::build(cohorts, &by_builder);
        let sizes: Vec<usize> = chain.traverse().map(|n| n.requests.len()).collect();
        assert_eq!(sizes, vec![1, 2, 1]);
    }

    #[test]
    fn traverse_is_empty_for_an_empty_chain() {
        let chain = Chain::build(Vec::new(), &HashMap::new());
        assert_eq!(chain.traverse().count(), 0);
    }

    #[tokio::test]
    async fn completion_signal_waits_for_every_member_and_reports_each_as_it_lands() {
        let cohorts = vec![vec![BuilderName::new("A"), BuilderName::new("B")]];
        let mut by_builder = HashMap::new();
        by_builder.insert(BuilderName::new("A"), req("A"));
        by_builder.insert(BuilderName::new("B"), req("B"));
        let chain = Chain::build(cohorts, &by_builder);

        let node = chain.node(chain.head());
        let a = node.requests[0].clone();
        let b = node.requests[1].clone();

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let signal = node.completion_signal(move |_req, _result| {
            let seen3 = seen2.clone();
            async move {
                seen3.fetch_add(1, Ordering::SeqCst);
            }
        });

        a.complete(BuildResult::Success).unwrap();
        b.complete(BuildResult::Success).unwrap();
        signal.await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
