use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use nodewatch_common::{FetchError, NodeStatus, SyncState};

use crate::config::SyncConfig;
use crate::fetcher::{HttpStatusFetcher, StatusFetcher};

type Listener = Arc<dyn Fn(&SyncState) + Send + Sync>;
type FetchFuture = Pin<Box<dyn Future<Output = Result<NodeStatus, FetchError>> + Send>>;

enum Lifecycle {
    Idle,
    Running(CancellationToken),
    Stopped,
}

struct Inner {
    state: SyncState,
    lifecycle: Lifecycle,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    /// Dropped on stop so that open change streams end.
    tx: Option<watch::Sender<SyncState>>,
}

#[derive(Debug, Default)]
struct Counters {
    fetches_total: AtomicU64,
    failures_total: AtomicU64,
    ticks_skipped_total: AtomicU64,
    transitions_total: AtomicU64,
}

struct Shared {
    fetcher: Arc<dyn StatusFetcher>,
    config: SyncConfig,
    inner: Mutex<Inner>,
    counters: Counters,
}

/// Point-in-time copy of a store's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub fetches_total: u64,
    pub failures_total: u64,
    pub ticks_skipped_total: u64,
    pub transitions_total: u64,
}

/// Keeps one node's `SyncState` fresh by polling a `StatusFetcher`.
///
/// Handles are cheap to clone and share the same state. Polling stops on
/// `stop()` or when the last handle is dropped.
///
/// A listener that captures a `NodeStatusStore` clone keeps the store alive
/// (and polling) until `stop()`. Listeners that need the store should hold a
/// `WeakNodeStatusStore` from `downgrade()` instead.
#[derive(Clone)]
pub struct NodeStatusStore {
    shared: Arc<Shared>,
}

/// Non-owning store handle; does not keep polling alive.
#[derive(Clone)]
pub struct WeakNodeStatusStore {
    shared: Weak<Shared>,
}

/// Returned by `NodeStatusStore::subscribe`. Unsubscribing is permanent and
/// may be done from inside the listener itself.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl std::fmt::Debug for NodeStatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        let lifecycle = match inner.lifecycle {
            Lifecycle::Idle => "idle",
            Lifecycle::Running(_) => "running",
            Lifecycle::Stopped => "stopped",
        };
        f.debug_struct("NodeStatusStore")
            .field("config", &self.shared.config)
            .field("lifecycle", &lifecycle)
            .field("state", &inner.state)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl NodeStatusStore {
    pub fn new(fetcher: Arc<dyn StatusFetcher>, config: SyncConfig) -> Self {
        let (tx, _rx) = watch::channel(SyncState::Pending);
        Self {
            shared: Arc::new(Shared {
                fetcher,
                config,
                inner: Mutex::new(Inner {
                    state: SyncState::Pending,
                    lifecycle: Lifecycle::Idle,
                    listeners: BTreeMap::new(),
                    next_listener_id: 0,
                    tx: Some(tx),
                }),
                counters: Counters::default(),
            }),
        }
    }

    pub fn with_fetcher<F: StatusFetcher + 'static>(fetcher: F, config: SyncConfig) -> Self {
        Self::new(Arc::new(fetcher), config)
    }

    /// Store polling `{base_url}/api/data` over HTTP.
    pub fn http(base_url: &str, config: SyncConfig) -> Result<Self, FetchError> {
        let fetcher = HttpStatusFetcher::new(base_url, &config)?;
        Ok(Self::with_fetcher(fetcher, config))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    pub fn downgrade(&self) -> WeakNodeStatusStore {
        WeakNodeStatusStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Begin polling. Calling it on a running or stopped store does nothing,
    /// as does calling it outside a Tokio runtime.
    pub fn start(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("start ignored, no tokio runtime available");
            return;
        };
        let cancel = {
            let mut inner = self.shared.lock();
            match inner.lifecycle {
                Lifecycle::Running(_) => return,
                Lifecycle::Stopped => {
                    tracing::debug!("start ignored, store already stopped");
                    return;
                }
                Lifecycle::Idle => {}
            }
            let cancel = CancellationToken::new();
            inner.lifecycle = Lifecycle::Running(cancel.clone());
            cancel
        };

        let config = self.shared.config;
        tracing::info!(
            interval_ms = config.interval_ms,
            timeout_ms = config.timeout_ms,
            "node status polling started"
        );
        runtime.spawn(poll_loop(
            Arc::downgrade(&self.shared),
            self.shared.fetcher.clone(),
            config,
            cancel,
        ));
    }

    /// Stop polling for good and release every subscriber. A fetch still in
    /// flight is abandoned and its result never applied. Idempotent.
    pub fn stop(&self) {
        let (previous, listeners, tx) = {
            let mut inner = self.shared.lock();
            if matches!(inner.lifecycle, Lifecycle::Stopped) {
                return;
            }
            let previous = std::mem::replace(&mut inner.lifecycle, Lifecycle::Stopped);
            (
                previous,
                std::mem::take(&mut inner.listeners),
                inner.tx.take(),
            )
        };

        if let Lifecycle::Running(cancel) = previous {
            cancel.cancel();
        }
        // released outside the lock, listener captures may run arbitrary drops
        drop(listeners);
        drop(tx);
        tracing::info!("node status polling stopped");
    }

    pub fn is_running(&self) -> bool {
        matches!(self.shared.lock().lifecycle, Lifecycle::Running(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.shared.lock().lifecycle, Lifecycle::Stopped)
    }

    /// Current state. Reflects the most recently applied transition.
    pub fn snapshot(&self) -> SyncState {
        self.shared.lock().state.clone()
    }

    /// Register `listener` to be called synchronously after every change.
    ///
    /// On a stopped store the listener is dropped right away and the
    /// returned subscription is inert.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        let mut inner = self.shared.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        if !matches!(inner.lifecycle, Lifecycle::Stopped) {
            inner.listeners.insert(id, Arc::new(listener));
        }
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Stream of states: the current one first, then each later change.
    /// Slow readers only see the latest state. Ends once the store stops.
    pub fn changes(&self) -> WatchStream<SyncState> {
        let inner = self.shared.lock();
        let rx = match &inner.tx {
            Some(tx) => tx.subscribe(),
            None => watch::channel(inner.state.clone()).1,
        };
        WatchStream::new(rx)
    }

    pub fn stats(&self) -> SyncStats {
        let c = &self.shared.counters;
        SyncStats {
            fetches_total: c.fetches_total.load(Ordering::Relaxed),
            failures_total: c.failures_total.load(Ordering::Relaxed),
            ticks_skipped_total: c.ticks_skipped_total.load(Ordering::Relaxed),
            transitions_total: c.transitions_total.load(Ordering::Relaxed),
        }
    }
}

impl WeakNodeStatusStore {
    /// `None` once every `NodeStatusStore` handle is gone.
    pub fn upgrade(&self) -> Option<NodeStatusStore> {
        self.shared.upgrade().map(|shared| NodeStatusStore { shared })
    }
}

impl std::fmt::Debug for WeakNodeStatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakNodeStatusStore")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().listeners.remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.lock().listeners.contains_key(&self.id))
            .unwrap_or(false)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one fetch outcome. Returns false when the store is no longer
    /// running or the state did not change.
    fn apply(&self, outcome: Result<NodeStatus, FetchError>) -> bool {
        let (next, ids) = {
            let mut inner = self.lock();
            if !matches!(inner.lifecycle, Lifecycle::Running(_)) {
                return false;
            }
            let next = inner.state.advance(outcome);
            if next == inner.state {
                return false;
            }
            inner.state = next.clone();
            if let Some(tx) = &inner.tx {
                tx.send_replace(next.clone());
            }
            let ids: Vec<u64> = inner.listeners.keys().copied().collect();
            (next, ids)
        };
        self.counters.transitions_total.fetch_add(1, Ordering::Relaxed);

        for id in ids {
            // re-check each time: an earlier listener may have removed this one
            let listener = self.lock().listeners.get(&id).cloned();
            if let Some(listener) = listener {
                // a panicking listener must not take the poll task down with it
                if catch_unwind(AssertUnwindSafe(|| listener(&next))).is_err() {
                    tracing::error!(listener_id = id, "node status listener panicked");
                }
            }
        }
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Lifecycle::Running(cancel) = &inner.lifecycle {
            cancel.cancel();
        }
    }
}

fn start_fetch(fetcher: Arc<dyn StatusFetcher>, timeout: Duration) -> FetchFuture {
    Box::pin(async move {
        match tokio::time::timeout(timeout, fetcher.fetch_once()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    })
}

async fn resolve(in_flight: &mut Option<FetchFuture>) -> Result<NodeStatus, FetchError> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

/// One fetch at a time; ticks that fire while a fetch is pending are skipped.
async fn poll_loop(
    weak: Weak<Shared>,
    fetcher: Arc<dyn StatusFetcher>,
    config: SyncConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let timeout = config.timeout();

    let mut in_flight: Option<FetchFuture> = None;
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = resolve(&mut in_flight) => {
                in_flight = None;
                let Some(shared) = weak.upgrade() else { break };
                match &outcome {
                    Ok(status) => {
                        if consecutive_failures > 0 {
                            tracing::info!(
                                prev_failures = consecutive_failures,
                                address = %status.address,
                                "node status recovered"
                            );
                        }
                        consecutive_failures = 0;
                    }
                    Err(e) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        shared.counters.failures_total.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, consecutive_failures, "node status fetch failed");
                    }
                }
                if !shared.apply(outcome) {
                    tracing::trace!("fetch outcome left state unchanged");
                }
            }
            _ = ticker.tick() => {
                let Some(shared) = weak.upgrade() else { break };
                if in_flight.is_some() {
                    shared.counters.ticks_skipped_total.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("previous fetch still in flight, skipping tick");
                } else {
                    shared.counters.fetches_total.fetch_add(1, Ordering::Relaxed);
                    in_flight = Some(start_fetch(fetcher.clone(), timeout));
                }
            }
        }
    }

    tracing::debug!("node status poll loop exited");
}
