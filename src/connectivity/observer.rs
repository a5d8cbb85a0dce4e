//! Connectivity observer.
//!
//! Owns the platform listener while initialized and republishes its events:
//! network changes are de-duplicated against the last known value, app-state changes are
//! forwarded as the platform reports them.

use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::platform::{AppState, ConnectivityState, PlatformEvent, PlatformSignals};
use crate::listeners::{lock, Deregister, ListenerSet, Subscription};

pub type ConnectivityCallback = Arc<dyn Fn(bool) + Send + Sync>;
pub type AppStateCallback = Arc<dyn Fn(AppStateTransition) + Send + Sync>;

type ConnectivityListeners = ListenerSet<dyn Fn(bool) + Send + Sync>;
type AppStateListeners = ListenerSet<dyn Fn(AppStateTransition) + Send + Sync>;

/// An app-state change, with the state it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppStateTransition {
    pub previous: AppState,
    pub current: AppState,
}

impl AppStateTransition {
    /// True when the app came to the foreground from background or inactive.
    pub fn became_active(&self) -> bool {
        !self.previous.is_active() && self.current.is_active()
    }
}

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("Connectivity observer requires a running tokio runtime")]
    NoRuntime,
}

struct ListenerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct ObserverInner {
    platform: Arc<dyn PlatformSignals>,
    state: Mutex<ConnectivityState>,
    connectivity_listeners: Arc<ConnectivityListeners>,
    app_state_listeners: Arc<AppStateListeners>,
    task: Mutex<Option<ListenerTask>>,
}

/// Observes connectivity and app-state changes of the platform.
#[derive(Clone)]
pub struct ConnectivityObserver {
    inner: Arc<ObserverInner>,
}

impl ConnectivityObserver {
    pub fn new(platform: Arc<dyn PlatformSignals>) -> Self {
        let state = platform.snapshot();
        Self {
            inner: Arc::new(ObserverInner {
                platform,
                state: Mutex::new(state),
                connectivity_listeners: Arc::new(ListenerSet::new("connectivity")),
                app_state_listeners: Arc::new(ListenerSet::new("app state")),
                task: Mutex::new(None),
            }),
        }
    }

    /// Acquire the platform listener and start forwarding its events.
    ///
    /// Calling it again while initialized does nothing.
    pub fn initialize(&self) -> Result<(), ConnectivityError> {
        let mut task = lock(&self.inner.task);
        if task.is_some() {
            debug!("Connectivity observer already initialized");
            return Ok(());
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ConnectivityError::NoRuntime)?;

        // Listen before reading the snapshot so no event falls between the two
        let events = self.inner.platform.listen();
        let snapshot = self.inner.platform.snapshot();
        *lock(&self.inner.state) = snapshot;

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(forward_platform_events(
            Arc::downgrade(&self.inner),
            events,
            cancel.clone(),
        ));
        *task = Some(ListenerTask { cancel, handle });

        info!(
            "Connectivity observer started (connected={}, app_state={:?})",
            snapshot.is_connected, snapshot.app_state
        );
        Ok(())
    }

    /// Release the platform listener. Idempotent, safe without [`initialize`](Self::initialize).
    pub fn cleanup(&self) {
        if let Some(task) = lock(&self.inner.task).take() {
            task.stop();
            info!("Connectivity observer stopped");
        }
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.inner.task).is_some()
    }

    /// Register a callback invoked with the new value whenever connectivity flips.
    pub fn on_connectivity_change(&self, callback: ConnectivityCallback) -> Subscription {
        let id = self.inner.connectivity_listeners.register(callback);
        let registry: Weak<dyn Deregister> =
            Arc::downgrade(&self.inner.connectivity_listeners) as Weak<dyn Deregister>;
        Subscription::new(registry, id)
    }

    /// Register a callback invoked on every app-state change reported by the platform.
    pub fn on_app_state_change(&self, callback: AppStateCallback) -> Subscription {
        let id = self.inner.app_state_listeners.register(callback);
        let registry: Weak<dyn Deregister> =
            Arc::downgrade(&self.inner.app_state_listeners) as Weak<dyn Deregister>;
        Subscription::new(registry, id)
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner.state).is_connected
    }

    pub fn is_app_active(&self) -> bool {
        lock(&self.inner.state).app_state.is_active()
    }

    pub fn app_state(&self) -> AppState {
        lock(&self.inner.state).app_state
    }

    pub fn state(&self) -> ConnectivityState {
        *lock(&self.inner.state)
    }
}

impl ListenerTask {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

impl ObserverInner {
    fn handle_event(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::Network { is_connected } => {
                let mut state = lock(&self.state);
                if state.is_connected == is_connected {
                    return;
                }
                state.is_connected = is_connected;
                drop(state);

                info!("Connectivity changed: connected={}", is_connected);
                self.connectivity_listeners
                    .notify(|callback| callback(is_connected));
            }
            PlatformEvent::AppState(current) => {
                let mut state = lock(&self.state);
                let previous = state.app_state;
                state.app_state = current;
                drop(state);

                debug!("App state changed: {:?} -> {:?}", previous, current);
                let transition = AppStateTransition { previous, current };
                self.app_state_listeners
                    .notify(|callback| callback(transition));
            }
        }
    }
}

impl Drop for ObserverInner {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.stop();
        }
    }
}

async fn forward_platform_events(
    inner: Weak<ObserverInner>,
    mut events: mpsc::UnboundedReceiver<PlatformEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("Platform closed the connectivity listener");
                    break;
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.handle_event(event);
            }
        }
    }
}
