//! Unread-count cache shared by every notification consumer of the app.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::listeners::{lock, Deregister, ListenerSet, Subscription};
use crate::notifications::{DataSourceError, NotificationDataSource, UserId};

/// Callback invoked with no arguments whenever the unread count changes.
pub type UnreadCallback = Arc<dyn Fn() + Send + Sync>;

type UnreadListeners = ListenerSet<dyn Fn() + Send + Sync>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

const FAILURE_CHANNEL_CAPACITY: usize = 16;

/// Result of a [`NotificationSyncCore::refresh`] call, shared by every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server count was stored. `changed` tells whether subscribers were notified.
    Applied { count: u64, changed: bool },
    /// The data source failed; the cached count was left untouched.
    Failed(DataSourceError),
    /// The identity changed while the request was in flight; its result was dropped.
    Discarded,
    /// Nothing to refresh: no identity is set or the core was disposed.
    Skipped,
}

/// A refresh failure, published for diagnostics.
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    pub user_id: UserId,
    pub error: DataSourceError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncPhase {
    Uninitialized,
    Loading,
    Ready,
}

struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

struct SyncState {
    identity: Option<UserId>,
    /// Bumped on every identity change; results of requests stamped with an older
    /// generation are never applied.
    generation: u64,
    unread_count: u64,
    phase: SyncPhase,
    loaded: bool,
    in_flight: Option<InFlight>,
    disposed: bool,
}

struct SyncInner {
    data_source: Arc<dyn NotificationDataSource>,
    state: Mutex<SyncState>,
    subscribers: Arc<UnreadListeners>,
    failures: broadcast::Sender<RefreshFailure>,
}

/// Process-wide view of the authenticated user's unread notification count.
///
/// Cloning yields another handle to the same cache. Create one at application start and
/// hand it to every binding that shows the count.
#[derive(Clone)]
pub struct NotificationSyncCore {
    inner: Arc<SyncInner>,
}

impl NotificationSyncCore {
    pub fn new(data_source: Arc<dyn NotificationDataSource>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SyncInner {
                data_source,
                state: Mutex::new(SyncState {
                    identity: None,
                    generation: 0,
                    unread_count: 0,
                    phase: SyncPhase::Ready,
                    loaded: false,
                    in_flight: None,
                    disposed: false,
                }),
                subscribers: Arc::new(ListenerSet::new("unread count")),
                failures,
            }),
        }
    }

    /// Declare the active session subject.
    ///
    /// Switching to a different identity drops any pending refresh result, resets the count
    /// to 0, notifies subscribers and then refreshes in the background for the new identity.
    /// Setting the current identity again does nothing.
    pub fn set_identity(&self, user_id: Option<UserId>) {
        let mut state = lock(&self.inner.state);
        if state.disposed {
            warn!("Ignoring identity change on a disposed notification sync core");
            return;
        }
        if state.identity == user_id {
            debug!("Identity unchanged, nothing to do");
            return;
        }

        match &user_id {
            Some(id) => info!("Notification sync identity set to {}", id),
            None => info!("Notification sync identity cleared"),
        }

        state.identity = user_id.clone();
        state.generation += 1;
        state.in_flight = None;
        state.unread_count = 0;
        state.loaded = false;
        state.phase = if user_id.is_some() {
            SyncPhase::Uninitialized
        } else {
            SyncPhase::Ready
        };
        drop(state);

        self.inner.notify_subscribers();

        if user_id.is_some() {
            self.spawn_refresh();
        }
    }

    /// Currently active identity.
    pub fn identity(&self) -> Option<UserId> {
        lock(&self.inner.state).identity.clone()
    }

    /// Register a callback for unread count changes.
    ///
    /// The returned handle unsubscribes when released or dropped.
    pub fn subscribe(&self, callback: UnreadCallback) -> Subscription {
        if lock(&self.inner.state).disposed {
            warn!("Subscribing to a disposed notification sync core");
            return Subscription::inert();
        }

        let id = self.inner.subscribers.register(callback);
        let registry: Weak<dyn Deregister> =
            Arc::downgrade(&self.inner.subscribers) as Weak<dyn Deregister>;
        Subscription::new(registry, id)
    }

    pub fn subscribe_fn(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.subscribe(Arc::new(callback))
    }

    /// Number of distinct callbacks currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Cached unread count. Never performs I/O.
    pub fn unread_count(&self) -> u64 {
        lock(&self.inner.state).unread_count
    }

    /// Whether a refresh succeeded for the current identity.
    pub fn has_loaded(&self) -> bool {
        lock(&self.inner.state).loaded
    }

    /// Whether a refresh for the current identity is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.phase() == SyncPhase::Loading
    }

    fn phase(&self) -> SyncPhase {
        lock(&self.inner.state).phase
    }

    /// Fetch the unread count for the current identity.
    ///
    /// At most one request per identity is in flight: calls made while one is pending
    /// wait for that request instead of issuing another. Failures are logged, published on
    /// [`refresh_failures`](Self::refresh_failures) and returned, never raised.
    pub async fn refresh(&self) -> RefreshOutcome {
        let future = {
            let mut state = lock(&self.inner.state);
            if state.disposed {
                return RefreshOutcome::Skipped;
            }
            let Some(user_id) = state.identity.clone() else {
                debug!("No identity set, skipping unread count refresh");
                return RefreshOutcome::Skipped;
            };

            match &state.in_flight {
                Some(in_flight) if in_flight.generation == state.generation => {
                    debug!("Joining in-flight unread count refresh for {}", user_id);
                    in_flight.future.clone()
                }
                _ => {
                    let generation = state.generation;
                    let future = fetch_unread_count(
                        Arc::downgrade(&self.inner),
                        self.inner.data_source.clone(),
                        user_id,
                        generation,
                    )
                    .boxed()
                    .shared();
                    state.in_flight = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    state.phase = SyncPhase::Loading;
                    future
                }
            }
        };

        future.await
    }

    /// Run [`refresh`](Self::refresh) on the ambient tokio runtime without waiting for it.
    ///
    /// Returns false when no runtime is available.
    pub fn spawn_refresh(&self) -> bool {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let core = self.clone();
                handle.spawn(async move {
                    core.refresh().await;
                });
                true
            }
            Err(_) => {
                warn!("No tokio runtime available, unread count refresh not started");
                false
            }
        }
    }

    /// Receiver of refresh failures, for diagnostics.
    pub fn refresh_failures(&self) -> broadcast::Receiver<RefreshFailure> {
        self.inner.failures.subscribe()
    }

    /// Adjust the cached count right away, clamped at 0.
    ///
    /// Used after a successful mark-read or delete so badges update before the next
    /// refresh. A later refresh overwrites the adjusted value with the server count.
    pub fn apply_local_delta(&self, delta: i64) {
        let mut state = lock(&self.inner.state);
        if state.disposed || state.identity.is_none() {
            debug!("No identity set, ignoring local unread delta {}", delta);
            return;
        }

        let current = state.unread_count;
        let next = if delta < 0 {
            let decrease = delta.unsigned_abs();
            if decrease > current {
                debug!(
                    "Unread delta {} would take count {} below zero, clamping",
                    delta, current
                );
            }
            current.saturating_sub(decrease)
        } else {
            current.saturating_add(delta as u64)
        };

        if next == current {
            return;
        }
        state.unread_count = next;
        drop(state);

        self.inner.notify_subscribers();
    }

    /// Tear the core down: subscribers are dropped, the identity is cleared and any
    /// in-flight refresh is fenced off. Later calls are no-ops.
    pub fn dispose(&self) {
        let mut state = lock(&self.inner.state);
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.identity = None;
        state.generation += 1;
        state.in_flight = None;
        state.unread_count = 0;
        state.loaded = false;
        state.phase = SyncPhase::Ready;
        drop(state);

        self.inner.subscribers.clear();
        info!("Notification sync core disposed");
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.inner.state).disposed
    }
}

impl std::fmt::Debug for NotificationSyncCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("NotificationSyncCore")
            .field("identity", &state.identity)
            .field("unread_count", &state.unread_count)
            .field("phase", &state.phase)
            .finish()
    }
}

async fn fetch_unread_count(
    inner: Weak<SyncInner>,
    data_source: Arc<dyn NotificationDataSource>,
    user_id: UserId,
    generation: u64,
) -> RefreshOutcome {
    let result = data_source.get_unread_count(&user_id).await;
    match inner.upgrade() {
        Some(inner) => inner.complete_refresh(generation, user_id, result),
        None => RefreshOutcome::Discarded,
    }
}

impl SyncInner {
    fn complete_refresh(
        &self,
        generation: u64,
        user_id: UserId,
        result: Result<u64, DataSourceError>,
    ) -> RefreshOutcome {
        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!(
                "Discarding unread count for {}, identity changed while in flight",
                user_id
            );
            return RefreshOutcome::Discarded;
        }
        state.in_flight = None;

        match result {
            Ok(count) => {
                let changed = state.unread_count != count;
                state.unread_count = count;
                state.loaded = true;
                state.phase = SyncPhase::Ready;
                drop(state);

                debug!("Unread count for {} is {}", user_id, count);
                if changed {
                    self.notify_subscribers();
                }
                RefreshOutcome::Applied { count, changed }
            }
            Err(error) => {
                state.phase = if state.loaded {
                    SyncPhase::Ready
                } else {
                    SyncPhase::Uninitialized
                };
                drop(state);

                warn!("Failed to refresh unread count for {}: {}", user_id, error);
                // Nobody listening is fine
                let _ = self.failures.send(RefreshFailure {
                    user_id,
                    error: error.clone(),
                });
                RefreshOutcome::Failed(error)
            }
        }
    }

    fn notify_subscribers(&self) {
        let failed = self.subscribers.notify(|callback| callback());
        if failed > 0 {
            warn!("{} unread count subscribers failed", failed);
        }
    }
}
