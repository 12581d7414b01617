use std::path::PathBuf;

use crate::config::{Config, SessionConfig};
use crate::gateway::dispatcher::Dispatcher;
use crate::gateway::hub::Hub;

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub session: SessionConfig,
    pub static_dir: PathBuf,
}

impl AppState {
    /// Build the shared state. The returned dispatcher must be spawned for
    /// any broadcast to be delivered.
    pub fn new(config: &Config) -> (Self, Dispatcher) {
        let (hub, dispatcher) = Hub::new(config.session.queue_capacity, config.dispatch_capacity);
        let state = Self {
            hub,
            session: config.session.clone(),
            static_dir: config.static_dir.clone(),
        };
        (state, dispatcher)
    }
}
