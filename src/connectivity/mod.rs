//! Connectivity and app-foreground signals.
//!
//! [`ConnectivityObserver`] turns raw [`PlatformSignals`] into two de-coupled change streams
//! (network reachability and app state) that refresh policies subscribe to.

mod observer;
mod platform;

pub use observer::{
    AppStateCallback, AppStateTransition, ConnectivityCallback, ConnectivityError,
    ConnectivityObserver,
};
pub use platform::{
    AppState, ChannelPlatform, ConnectivityState, PlatformEvent, PlatformEventSender,
    PlatformSignals,
};
