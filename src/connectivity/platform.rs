//! Platform signal sources.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::listeners::lock;

/// Foreground state of the application as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

impl AppState {
    pub fn is_active(&self) -> bool {
        matches!(self, AppState::Active)
    }
}

/// Snapshot of connectivity and app state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub app_state: AppState,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            is_connected: true,
            app_state: AppState::Active,
        }
    }
}

/// A raw signal emitted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    Network { is_connected: bool },
    AppState(AppState),
}

/// Source of platform connectivity and app-state signals.
pub trait PlatformSignals: Send + Sync {
    /// Current state, read once when the observer starts.
    fn snapshot(&self) -> ConnectivityState;

    /// Acquire a listener. The platform stops delivering to it once the receiver is dropped.
    ///
    /// Every event is delivered; the observer de-duplicates against the last one it saw.
    fn listen(&self) -> mpsc::UnboundedReceiver<PlatformEvent>;
}

struct ChannelPlatformState {
    current: ConnectivityState,
    listeners: Vec<mpsc::UnboundedSender<PlatformEvent>>,
}

/// [`PlatformSignals`] fed by the embedding application through a [`PlatformEventSender`].
pub struct ChannelPlatform {
    state: Arc<Mutex<ChannelPlatformState>>,
}

/// Pushes platform events to every listener of a [`ChannelPlatform`].
#[derive(Clone)]
pub struct PlatformEventSender {
    state: Arc<Mutex<ChannelPlatformState>>,
}

impl ChannelPlatform {
    pub fn new(initial: ConnectivityState) -> (Self, PlatformEventSender) {
        let state = Arc::new(Mutex::new(ChannelPlatformState {
            current: initial,
            listeners: Vec::new(),
        }));
        (
            Self {
                state: state.clone(),
            },
            PlatformEventSender { state },
        )
    }
}

impl PlatformSignals for ChannelPlatform {
    fn snapshot(&self) -> ConnectivityState {
        lock(&self.state).current
    }

    fn listen(&self) -> mpsc::UnboundedReceiver<PlatformEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state).listeners.push(tx);
        rx
    }
}

impl PlatformEventSender {
    /// Record the event as current state and deliver it to live listeners.
    ///
    /// Listeners whose receiver was dropped are pruned. Returns how many received it.
    pub fn send(&self, event: PlatformEvent) -> usize {
        let mut state = lock(&self.state);
        match event {
            PlatformEvent::Network { is_connected } => state.current.is_connected = is_connected,
            PlatformEvent::AppState(app_state) => state.current.app_state = app_state,
        }

        state.listeners.retain(|listener| !listener.is_closed());
        let mut delivered = 0;
        for listener in &state.listeners {
            match listener.send(event) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Dropping platform event {:?}: {}", event, e),
            }
        }
        delivered
    }

    pub fn set_connected(&self, is_connected: bool) -> usize {
        self.send(PlatformEvent::Network { is_connected })
    }

    pub fn set_app_state(&self, app_state: AppState) -> usize {
        self.send(PlatformEvent::AppState(app_state))
    }

    /// Number of listeners whose receiver is still alive.
    pub fn listener_count(&self) -> usize {
        let mut state = lock(&self.state);
        state.listeners.retain(|listener| !listener.is_closed());
        state.listeners.len()
    }
}
