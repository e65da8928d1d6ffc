//! Shared application state handed to every handler.

use std::sync::Arc;

use staytuned_core::config::AppConfig;
use staytuned_realtime::RealtimeEngine;

/// Application state cloned into each request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// The real-time engine.
    pub realtime: Arc<RealtimeEngine>,
}

impl AppState {
    /// Bundle configuration and engine.
    pub fn new(config: AppConfig, realtime: RealtimeEngine) -> Self {
        Self {
            config: Arc::new(config),
            realtime: Arc::new(realtime),
        }
    }
}
