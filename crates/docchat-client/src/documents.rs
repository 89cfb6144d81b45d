//! Document collection and selection.
//!
//! Refreshes are single-flight. A refresh requested while one is outstanding
//! does not start a second request; it marks the in-flight one for a rerun,
//! whose result then replaces the collection. Results are never merged.
//! A reset does not end the outstanding request; a refresh asked for after
//! it still waits for that request and reruns under the new epoch.

use std::sync::{Arc, Mutex, MutexGuard};

use docchat_core::{ClientEvent, Document, DocumentId, EventBus};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ErrorKind};
use crate::lock;

/// Shown when the list request fails.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch documents. Please try to logout.";
/// Shown when the list response is not an array of documents.
pub const UNEXPECTED_FORMAT_MESSAGE: &str = "Unexpected data format received from server";

/// Result of a [`DocumentStore::refresh`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The collection was replaced.
    Refreshed { count: usize, selection_cleared: bool },
    /// The request failed; the previous collection is kept.
    Failed { kind: ErrorKind, message: String },
    /// Another refresh was in flight and will rerun on our behalf.
    Coalesced,
    /// The store was reset while the request was outstanding.
    Discarded,
}

/// Result of a [`DocumentStore::select`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Changed(Document),
    /// Already selected; nothing downstream should reset.
    Unchanged,
    /// No document with that id is in the collection.
    Missing,
}

#[derive(Debug, Default)]
struct DocumentState {
    documents: Vec<Document>,
    selected: Option<DocumentId>,
    loading: bool,
    /// A list request is on the wire. Survives reset.
    inflight: bool,
    rerun: bool,
    error: Option<String>,
    epoch: u64,
}

impl DocumentState {
    fn find(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }
}

/// Owns the document list and the selection pointer.
#[derive(Clone)]
pub struct DocumentStore {
    api: ApiClient,
    events: EventBus,
    state: Arc<Mutex<DocumentState>>,
}

impl DocumentStore {
    pub fn new(api: ApiClient, events: EventBus) -> Self {
        Self {
            api,
            events,
            state: Arc::new(Mutex::new(DocumentState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, DocumentState> {
        lock(&self.state)
    }

    /// Fetch the list and replace the collection.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut epoch = {
            let mut state = self.state();
            if state.inflight {
                state.rerun = true;
                state.loading = true;
                debug!("Refresh already in flight; coalescing");
                return RefreshOutcome::Coalesced;
            }
            state.inflight = true;
            state.loading = true;
            state.error = None;
            state.epoch
        };

        loop {
            let result = self.api.list_documents().await;

            let mut state = self.state();
            if state.rerun {
                state.rerun = false;
                epoch = state.epoch;
                debug!("Rerunning superseded refresh");
                continue;
            }
            state.inflight = false;
            if state.epoch != epoch {
                debug!("Discarding document list from before reset");
                return RefreshOutcome::Discarded;
            }
            state.loading = false;

            return match result {
                Ok(documents) => {
                    let count = documents.len();
                    state.documents = documents;
                    let selection_cleared = match state.selected {
                        Some(id) if state.find(id).is_none() => {
                            state.selected = None;
                            true
                        }
                        _ => false,
                    };
                    drop(state);

                    info!(count, "Documents refreshed");
                    self.events
                        .publish(ClientEvent::DocumentsRefreshed { count });
                    if selection_cleared {
                        self.events
                            .publish(ClientEvent::SelectionChanged { document_id: None });
                    }
                    RefreshOutcome::Refreshed {
                        count,
                        selection_cleared,
                    }
                }
                Err(e) => {
                    let message = match e {
                        ClientError::UnexpectedFormat(_) => UNEXPECTED_FORMAT_MESSAGE,
                        _ => FETCH_FAILED_MESSAGE,
                    }
                    .to_string();
                    state.error = Some(message.clone());
                    drop(state);

                    warn!(error = %e, "Failed to fetch documents");
                    self.events.publish(ClientEvent::DocumentsFailed {
                        message: message.clone(),
                    });
                    RefreshOutcome::Failed {
                        kind: e.kind(),
                        message,
                    }
                }
            };
        }
    }

    /// Point the selection at the document with `id`.
    pub fn select(&self, id: DocumentId) -> Selection {
        let mut state = self.state();
        if state.selected == Some(id) {
            return Selection::Unchanged;
        }
        let Some(document) = state.find(id).cloned() else {
            return Selection::Missing;
        };
        state.selected = Some(id);
        drop(state);

        debug!(document_id = %id, "Document selected");
        self.events.publish(ClientEvent::SelectionChanged {
            document_id: Some(id),
        });
        Selection::Changed(document)
    }

    /// Return to the state of a fresh load. Outstanding results are dropped.
    pub fn reset(&self) {
        let mut state = self.state();
        let epoch = state.epoch.wrapping_add(1);
        let inflight = state.inflight;
        *state = DocumentState {
            epoch,
            inflight,
            ..DocumentState::default()
        };
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state().documents.clone()
    }

    pub fn selected(&self) -> Option<Document> {
        let state = self.state();
        state.selected.and_then(|id| state.find(id).cloned())
    }

    pub fn selected_id(&self) -> Option<DocumentId> {
        self.state().selected
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state().documents.is_empty()
    }
}
