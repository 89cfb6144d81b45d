use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{DocumentId, UploadPhase};

/// State-change notifications for the rendering surface.
///
/// Emitted by the client components after each mutation. The surface only
/// reflects state; nothing in the client awaits a consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ClientEvent {
    // =========================================================================
    // Session
    // =========================================================================
    /// A token was stored or cleared.
    SessionChanged { authenticated: bool },

    // =========================================================================
    // Documents
    // =========================================================================
    /// A refresh replaced the document collection.
    DocumentsRefreshed { count: usize },

    /// A refresh failed; the previous collection is kept.
    DocumentsFailed { message: String },

    /// The selection pointer moved (or was cleared).
    SelectionChanged { document_id: Option<DocumentId> },

    // =========================================================================
    // Conversation
    // =========================================================================
    /// The conversation log was discarded for a new document identity.
    ConversationReset { document_id: Option<DocumentId> },

    /// The log changed; the surface should scroll to the newest entry.
    ScrollToLatest {
        document_id: DocumentId,
        message_count: usize,
    },

    // =========================================================================
    // Upload
    // =========================================================================
    /// The upload pipeline entered a new phase.
    UploadPhaseChanged { phase: UploadPhase },
}

/// Broadcast fan-out for [`ClientEvent`]s.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Never blocks; having no subscribers is fine.
    pub fn publish(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(ClientEvent::SessionChanged {
            authenticated: false,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(ClientEvent::DocumentsRefreshed { count: 2 });
        bus.clone().publish(ClientEvent::SelectionChanged {
            document_id: Some(DocumentId(1)),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::DocumentsRefreshed { count: 2 }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::SelectionChanged {
                document_id: Some(DocumentId(1))
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = ClientEvent::UploadPhaseChanged {
            phase: UploadPhase::Uploading,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("UploadPhaseChanged"));
        assert!(json.contains("uploading"));
    }
}
