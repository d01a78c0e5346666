//! `InMemoryStatusSink` — the reference [`StatusSink`] implementation.
//!
//! Combines a `tokio::sync::broadcast` channel (for watchers that want to
//! subscribe and poll independently) with a `Vec` of boxed callbacks
//! (for watchers that want to be invoked synchronously, in-process) and a
//! pair of `tokio::sync::Notify`s backing the two `wait_until_*` futures.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};

use dispatch_kernel::request::BuildStatus;
use dispatch_kernel::status::{BuildSetResult, StatusSink};

type Watcher = Box<dyn Fn(BuildSetResult) + Send + Sync>;

struct Inner {
    statuses: Vec<BuildStatus>,
    result: Option<BuildSetResult>,
    hope_lost: bool,
    success_settled: bool,
    finished_settled: bool,
    success_watchers: Vec<Watcher>,
    finished_watchers: Vec<Watcher>,
}

/// An in-memory [`StatusSink`] suitable both as the crate's reference
/// implementation and as the sink used throughout this crate's own tests.
pub struct InMemoryStatusSink {
    inner: Mutex<Inner>,
    success_notify: Notify,
    finished_notify: Notify,
    success_tx: broadcast::Sender<BuildSetResult>,
    finished_tx: broadcast::Sender<BuildSetResult>,
}

impl InMemoryStatusSink {
    /// `capacity` bounds the broadcast channels backing
    /// [`subscribe_success`](Self::subscribe_success) /
    /// [`subscribe_finished`](Self::subscribe_finished); a lagging
    /// subscriber sees `RecvError::Lagged` rather than unbounded memory
    /// growth.
    pub fn new(capacity: usize) -> Self {
        let (success_tx, _) = broadcast::channel(capacity.max(1));
        let (finished_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(Inner {
                statuses: Vec::new(),
                result: None,
                hope_lost: false,
                success_settled: false,
                finished_settled: false,
                success_watchers: Vec::new(),
                finished_watchers: Vec::new(),
            }),
            success_notify: Notify::new(),
            finished_notify: Notify::new(),
            success_tx,
            finished_tx,
        }
    }

    /// Every request status handle registered so far, in registration
    /// order.
    pub fn request_statuses(&self) -> Vec<BuildStatus> {
        self.inner.lock().unwrap().statuses.clone()
    }

    pub fn hope_lost(&self) -> bool {
        self.inner.lock().unwrap().hope_lost
    }

    /// Register a callback invoked synchronously, in-process, whenever the
    /// success signal fires.
    pub fn add_success_watcher(&self, watcher: impl Fn(BuildSetResult) + Send + Sync + 'static) {
        self.inner.lock().unwrap().success_watchers.push(Box::new(watcher));
    }

    /// Register a callback invoked synchronously, in-process, whenever the
    /// finished signal fires.
    pub fn add_finished_watcher(&self, watcher: impl Fn(BuildSetResult) + Send + Sync + 'static) {
        self.inner.lock().unwrap().finished_watchers.push(Box::new(watcher));
    }

    pub fn subscribe_success(&self) -> broadcast::Receiver<BuildSetResult> {
        self.success_tx.subscribe()
    }

    pub fn subscribe_finished(&self) -> broadcast::Receiver<BuildSetResult> {
        self.finished_tx.subscribe()
    }
}

#[async_trait]
impl StatusSink for InMemoryStatusSink {
    fn set_request_statuses(&self, statuses: Vec<BuildStatus>) {
        self.inner.lock().unwrap().statuses = statuses;
    }

    fn set_results(&self, result: BuildSetResult) {
        self.inner.lock().unwrap().result = Some(result);
    }

    fn give_up_hope(&self) {
        self.inner.lock().unwrap().hope_lost = true;
    }

    fn notify_success_watchers(&self) {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            inner.success_settled = true;
            inner.result
        };
        if let Some(result) = result {
            {
                let inner = self.inner.lock().unwrap();
                for w in &inner.success_watchers {
                    w(result);
                }
            }
            let _ = self.success_tx.send(result);
        }
        self.success_notify.notify_waiters();
    }

    fn notify_finished_watchers(&self) {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            inner.finished_settled = true;
            inner.result
        };
        if let Some(result) = result {
            {
                let inner = self.inner.lock().unwrap();
                for w in &inner.finished_watchers {
                    w(result);
                }
            }
            let _ = self.finished_tx.send(result);
        }
        self.finished_notify.notify_waiters();
    }

    async fn wait_until_success(&self) -> BuildSetResult {
        loop {
            let notified = self.success_notify.notified();
            {
                let inner = self.inner.lock().unwrap();
                if inner.success_settled {
                    return inner.result.expect("success_settled implies a result was recorded");
                }
            }
            notified.await;
        }
    }

    async fn wait_until_finished(&self) -> BuildSetResult {
        loop {
            let notified = self.finished_notify.notified();
            {
                let inner = self.inner.lock().unwrap();
                if inner.finished_settled {
                    return inner.result.expect("finished_settled implies a result was recorded");
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn finished_settles_after_results_are_set() {
        let sink = InMemoryStatusSink::new(16);
        sink.set_results(BuildSetResult::Success);
        sink.notify_success_watchers();
        sink.notify_finished_watchers();

        assert_eq!(sink.wait_until_success().await, BuildSetResult::Success);
        assert_eq!(sink.wait_until_finished().await, BuildSetResult::Success);
    }

    #[tokio::test]
    async fn synchronous_watchers_fire_exactly_once() {
        let sink = InMemoryStatusSink::new(16);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        sink.add_finished_watcher(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        sink.set_results(BuildSetResult::Failure);
        sink.notify_finished_watchers();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broadcast_subscribers_observe_the_result() {
        let sink = InMemoryStatusSink::new(16);
        let mut rx = sink.subscribe_finished();

        sink.set_results(BuildSetResult::Warnings);
        sink.notify_finished_watchers();

        assert_eq!(rx.recv().await.unwrap(), BuildSetResult::Warnings);
    }
}
