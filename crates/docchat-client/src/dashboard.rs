//! The protected dashboard: documents, selection, chat and upload wired
//! together behind one handle.

use std::sync::Arc;

use async_trait::async_trait;
use docchat_core::error::DocChatError;
use docchat_core::{Document, DocumentId, EventBus, UploadFile};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::backend::DocumentBackend;
use crate::conversation::{ConversationSession, SendOutcome};
use crate::documents::{DocumentStore, RefreshOutcome, Selection};
use crate::gate::{Navigation, Route, SessionGate};
use crate::session::SessionStore;
use crate::upload::{UploadCompletion, UploadOutcome, UploadPipeline};

/// Shown when the collection is empty and nothing went wrong.
pub const EMPTY_STATE_MESSAGE: &str = "No documents found. Upload one to get started!";

/// Keep the conversation keyed on whatever the store has selected.
fn follow_selection(documents: &DocumentStore, conversation: &ConversationSession) {
    conversation.follow(documents.selected());
}

/// Refreshes the document list after each successful upload.
struct RefreshOnUpload {
    documents: DocumentStore,
    conversation: ConversationSession,
}

#[async_trait]
impl UploadCompletion for RefreshOnUpload {
    async fn upload_completed(&self, document: &Document) {
        debug!(document_id = %document.id, "Refreshing after upload");
        self.documents.refresh().await;
        follow_selection(&self.documents, &self.conversation);
    }
}

pub struct Dashboard {
    session: Arc<SessionStore>,
    gate: SessionGate,
    documents: DocumentStore,
    conversation: ConversationSession,
    upload: UploadPipeline,
    events: EventBus,
}

impl Dashboard {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        session: Arc<SessionStore>,
        events: EventBus,
    ) -> Self {
        let api = ApiClient::new(backend, Arc::clone(&session));
        let documents = DocumentStore::new(api.clone(), events.clone());
        let conversation = ConversationSession::new(api.clone(), events.clone());
        let completion = Arc::new(RefreshOnUpload {
            documents: documents.clone(),
            conversation: conversation.clone(),
        });
        let upload = UploadPipeline::new(api, events.clone(), completion);

        Self {
            gate: SessionGate::new(Arc::clone(&session)),
            session,
            documents,
            conversation,
            upload,
            events,
        }
    }

    /// Enter the dashboard route. Loads the document list when allowed.
    pub async fn open(&self) -> Navigation {
        let navigation = self.gate.resolve(Route::Dashboard);
        match navigation {
            Navigation::Allow(_) => {
                self.refresh().await;
            }
            other => debug!(?other, "Dashboard not reachable"),
        }
        navigation
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let outcome = self.documents.refresh().await;
        follow_selection(&self.documents, &self.conversation);
        outcome
    }

    pub fn select(&self, id: DocumentId) -> Selection {
        let selection = self.documents.select(id);
        if let Selection::Changed(document) = &selection {
            self.conversation.follow(Some(document.clone()));
        }
        selection
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        self.conversation.send(text).await
    }

    pub async fn submit(&self) -> SendOutcome {
        self.conversation.submit().await
    }

    pub async fn upload(&self, files: Vec<UploadFile>) -> UploadOutcome {
        self.upload.drop_files(files).await
    }

    /// Clear the token and return every component to a fresh-load state.
    pub fn logout(&self) -> Result<(), DocChatError> {
        let result = self.session.logout();
        self.reset();
        info!("Dashboard reset after logout");
        result
    }

    /// Drop all client state without touching the session.
    pub fn reset(&self) {
        self.documents.reset();
        self.conversation.reset();
        self.upload.reset();
    }

    /// Placeholder text for the document list, if it should be shown.
    pub fn empty_state(&self) -> Option<&'static str> {
        let show = self.documents.is_empty()
            && !self.documents.is_loading()
            && self.documents.error().is_none();
        show.then_some(EMPTY_STATE_MESSAGE)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn conversation(&self) -> &ConversationSession {
        &self.conversation
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.upload
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use docchat_core::UploadPhase;

    fn dashboard(backend: Arc<MockBackend>, token: Option<&str>) -> Dashboard {
        let events = EventBus::default();
        let session = Arc::new(SessionStore::in_memory(events.clone()));
        if let Some(token) = token {
            session.set_token(token).unwrap();
        }
        Dashboard::new(backend, session, events)
    }

    #[tokio::test]
    async fn test_open_without_token_redirects_and_fetches_nothing() {
        let backend = Arc::new(MockBackend::new());
        let dash = dashboard(Arc::clone(&backend), None);

        assert_eq!(dash.open().await, Navigation::Redirect(Route::SignIn));
        assert_eq!(backend.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_open_loads_documents() {
        let backend = Arc::new(MockBackend::with_documents(vec![Document::new(1, "A")]));
        let dash = dashboard(Arc::clone(&backend), Some("t"));

        assert_eq!(dash.open().await, Navigation::Allow(Route::Dashboard));
        assert_eq!(dash.documents().documents().len(), 1);
        assert!(dash.empty_state().is_none());
    }

    #[tokio::test]
    async fn test_empty_state_message() {
        let backend = Arc::new(MockBackend::new());
        let dash = dashboard(backend, Some("t"));
        dash.open().await;
        assert_eq!(dash.empty_state(), Some(EMPTY_STATE_MESSAGE));
    }

    #[tokio::test]
    async fn test_select_rekeys_conversation() {
        let backend = Arc::new(MockBackend::with_documents(vec![
            Document::new(1, "A"),
            Document::new(2, "B"),
        ]));
        let dash = dashboard(backend, Some("t"));
        dash.open().await;

        dash.select(DocumentId(1));
        dash.send("hi").await;
        assert_eq!(dash.conversation().messages().len(), 2);

        // Re-selecting keeps the log.
        assert_eq!(dash.select(DocumentId(1)), Selection::Unchanged);
        assert_eq!(dash.conversation().messages().len(), 2);

        dash.select(DocumentId(2));
        assert!(dash.conversation().messages().is_empty());
        assert_eq!(dash.conversation().title().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_refresh_that_drops_selection_resets_conversation() {
        let backend = Arc::new(MockBackend::with_documents(vec![Document::new(1, "A")]));
        let dash = dashboard(Arc::clone(&backend), Some("t"));
        dash.open().await;
        dash.select(DocumentId(1));
        dash.send("hi").await;

        backend.set_documents(Vec::new());
        dash.refresh().await;
        assert!(dash.documents().selected().is_none());
        assert!(dash.conversation().document_id().is_none());
        assert!(dash.conversation().messages().is_empty());
    }

    #[tokio::test]
    async fn test_upload_success_refreshes_exactly_once() {
        let backend = Arc::new(MockBackend::new());
        let dash = dashboard(Arc::clone(&backend), Some("t"));
        dash.open().await;
        let before = backend.list_calls();

        let outcome = dash
            .upload(vec![UploadFile::new("notes.txt", b"hello".to_vec())])
            .await;
        assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
        assert_eq!(backend.list_calls(), before + 1);
        assert_eq!(
            dash.documents().documents(),
            vec![Document::new(1, "notes.txt")]
        );
    }

    #[tokio::test]
    async fn test_logout_resets_everything() {
        let backend = Arc::new(MockBackend::with_documents(vec![Document::new(1, "A")]));
        let dash = dashboard(backend, Some("t"));
        dash.open().await;
        dash.select(DocumentId(1));
        dash.send("hi").await;

        dash.logout().unwrap();
        assert!(!dash.session().is_authenticated());
        assert!(dash.documents().is_empty());
        assert!(dash.documents().selected().is_none());
        assert!(dash.conversation().messages().is_empty());
        assert_eq!(dash.uploads().phase(), UploadPhase::Idle);
        assert_eq!(
            dash.gate().resolve(Route::Dashboard),
            Navigation::Redirect(Route::SignIn)
        );
    }
}
