//! Per-document chat log.
//!
//! The log is keyed on the identity of the selected document plus an epoch
//! that advances on every reset. A reply is appended only if both still match
//! the values captured when its request was issued.

use std::sync::{Arc, Mutex, MutexGuard};

use docchat_core::{
    ChatRequest, ClientEvent, Document, DocumentId, EventBus, Message, MessageId, Sender,
};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ErrorKind};
use crate::lock;

/// Shown when the chat request fails for a non-auth reason.
pub const REPLY_FAILED_MESSAGE: &str = "Failed to get a reply. Please try again.";
/// Shown when the chat request is rejected for authentication.
pub const REPLY_UNAUTHORIZED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Why a send did not issue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty or whitespace.
    Empty,
    /// A reply for this conversation is still outstanding.
    Pending,
    /// No document is selected.
    NoDocument,
}

/// Result of [`ConversationSession::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied(Message),
    Failed { kind: ErrorKind, message: String },
    Ignored(IgnoreReason),
    /// The conversation moved on before the reply arrived.
    Stale,
}

#[derive(Debug, Default)]
struct ConversationState {
    document: Option<Document>,
    epoch: u64,
    messages: Vec<Message>,
    pending: bool,
    input: String,
    error: Option<String>,
    next_id: u64,
}

impl ConversationState {
    fn push(&mut self, content: String, sender: Sender) -> Message {
        self.next_id += 1;
        let message = Message {
            id: MessageId(self.next_id),
            content,
            sender,
        };
        self.messages.push(message.clone());
        message
    }

    /// Drop everything tied to the current identity. Message ids keep counting.
    fn clear(&mut self, document: Option<Document>) {
        self.document = document;
        self.epoch = self.epoch.wrapping_add(1);
        self.messages.clear();
        self.pending = false;
        self.input.clear();
        self.error = None;
    }
}

#[derive(Clone)]
pub struct ConversationSession {
    api: ApiClient,
    events: EventBus,
    state: Arc<Mutex<ConversationState>>,
}

impl ConversationSession {
    pub fn new(api: ApiClient, events: EventBus) -> Self {
        Self {
            api,
            events,
            state: Arc::new(Mutex::new(ConversationState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        lock(&self.state)
    }

    /// Re-key on `document`. Returns true if the log was discarded.
    ///
    /// A change of title alone keeps the log.
    pub fn follow(&self, document: Option<Document>) -> bool {
        let mut state = self.state();
        let current = state.document.as_ref().map(|d| d.id);
        let next = document.as_ref().map(|d| d.id);

        if current == next {
            if let (Some(slot), Some(doc)) = (state.document.as_mut(), document) {
                slot.title = doc.title;
            }
            return false;
        }

        if state.pending {
            debug!("Abandoning outstanding reply for previous document");
        }
        state.clear(document);
        drop(state);

        debug!(document_id = ?next, "Conversation reset");
        self.events
            .publish(ClientEvent::ConversationReset { document_id: next });
        if let Some(document_id) = next {
            self.scroll(document_id, 0);
        }
        true
    }

    /// Unconditionally return to the empty state with no document.
    pub fn reset(&self) {
        self.state().clear(None);
        self.events
            .publish(ClientEvent::ConversationReset { document_id: None });
    }

    /// Send `text` to the assistant for the current document.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let (request, epoch) = {
            let mut state = self.state();
            let Some(document_id) = state.document.as_ref().map(|d| d.id) else {
                return SendOutcome::Ignored(IgnoreReason::NoDocument);
            };
            if text.trim().is_empty() {
                return SendOutcome::Ignored(IgnoreReason::Empty);
            }
            if state.pending {
                debug!(document_id = %document_id, "Send ignored; reply pending");
                return SendOutcome::Ignored(IgnoreReason::Pending);
            }

            state.push(text.to_string(), Sender::User);
            state.input.clear();
            state.pending = true;
            state.error = None;
            let count = state.messages.len();
            let epoch = state.epoch;
            drop(state);

            self.scroll(document_id, count);
            let request = ChatRequest {
                document_id,
                message: text.to_string(),
            };
            (request, epoch)
        };

        let result = self.api.send_chat(&request).await;

        let mut state = self.state();
        let current = state.document.as_ref().map(|d| d.id);
        if state.epoch != epoch || current != Some(request.document_id) {
            debug!(document_id = %request.document_id, "Discarding stale reply");
            return SendOutcome::Stale;
        }
        state.pending = false;

        match result {
            Ok(reply) => {
                let message = state.push(reply.reply, Sender::Assistant);
                let count = state.messages.len();
                drop(state);

                self.scroll(request.document_id, count);
                SendOutcome::Replied(message)
            }
            Err(e) => {
                let message = match e {
                    ClientError::Unauthorized(_) => REPLY_UNAUTHORIZED_MESSAGE,
                    _ => REPLY_FAILED_MESSAGE,
                }
                .to_string();
                state.error = Some(message.clone());
                drop(state);

                warn!(document_id = %request.document_id, error = %e, "Chat request failed");
                SendOutcome::Failed {
                    kind: e.kind(),
                    message,
                }
            }
        }
    }

    /// Send whatever is in the input buffer.
    pub async fn submit(&self) -> SendOutcome {
        let text = self.state().input.clone();
        self.send(&text).await
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.state().input = text.into();
    }

    pub fn input(&self) -> String {
        self.state().input.clone()
    }

    pub fn input_enabled(&self) -> bool {
        let state = self.state();
        state.document.is_some() && !state.pending
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.state().document.as_ref().map(|d| d.id)
    }

    /// Header text for the chat pane.
    pub fn title(&self) -> Option<String> {
        self.state().document.as_ref().map(|d| d.title.clone())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state().pending
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    fn scroll(&self, document_id: DocumentId, message_count: usize) {
        self.events.publish(ClientEvent::ScrollToLatest {
            document_id,
            message_count,
        });
    }
}
