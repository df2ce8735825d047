//! Outbound notifications to UI surfaces.

use crate::models::{BackgroundMessage, ExtensionState, PausedRequest};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 128;

/// Fan-out of [`BackgroundMessage`]s; sending with no subscribers is fine
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<BackgroundMessage>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundMessage> {
        self.tx.subscribe()
    }

    pub fn emit(&self, message: BackgroundMessage) {
        if self.tx.send(message).is_err() {
            tracing::trace!("No UI listeners for broadcast");
        }
    }

    pub fn state_updated(&self, state: ExtensionState) {
        self.emit(BackgroundMessage::StateUpdated { state });
    }

    pub fn request_paused(&self, request: PausedRequest) {
        self.emit(BackgroundMessage::RequestPaused { request });
    }

    pub fn request_resolved(&self, request_id: impl Into<String>) {
        self.emit(BackgroundMessage::RequestResolved {
            request_id: request_id.into(),
        });
    }
}
