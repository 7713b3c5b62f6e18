use std::sync::Arc;
use std::time::Duration;

use crate::automation::AutomationClient;
use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::registry::ChannelRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChannelRegistry>,
    pub dispatcher: Dispatcher,
    pub automation: Arc<dyn AutomationClient>,
    /// Interval between `ping` events on open streams
    pub heartbeat_interval: Duration,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(automation: Arc<dyn AutomationClient>) -> Self {
        let registry = Arc::new(ChannelRegistry::new());
        Self {
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            automation,
            heartbeat_interval: RelayConfig::DEFAULT_HEARTBEAT,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
