use std::sync::Arc;

use crate::protocol::RelayEvent;
use crate::registry::{ChannelRegistry, Frame};

/// Publishes events to every stream of a session
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ChannelRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// Serialize the event once and fan it out.
    ///
    /// Returns the number of recipients; zero means no listener is currently
    /// connected, which is not an error.
    pub fn deliver(&self, session_id: &str, event: &RelayEvent) -> usize {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(session_id, event = event.kind(), "Failed to serialize event: {}", e);
                return 0;
            }
        };

        let recipients = self.registry.deliver(session_id, &frame);
        if recipients == 0 {
            tracing::debug!(session_id, event = event.kind(), "No listener for event");
        } else {
            tracing::info!(session_id, event = event.kind(), recipients, "Event delivered");
        }
        recipients
    }
}
