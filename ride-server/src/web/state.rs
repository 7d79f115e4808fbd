//! Application state for the web layer.

use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::realtime::ConnectionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Booking, matching and every ride transition
    pub dispatcher: Arc<Dispatcher>,

    /// Live WebSocket sessions, by room
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            dispatcher,
            registry,
        }
    }
}
