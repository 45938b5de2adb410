use crate::channel::MethodChannel;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Method-call dispatcher wrapping the single recorder
    pub channel: Arc<MethodChannel>,
}

impl AppState {
    pub fn new(channel: MethodChannel) -> Self {
        Self {
            channel: Arc::new(channel),
        }
    }
}
