//! Single-flight document upload.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use docchat_core::{ClientEvent, Document, EventBus, UploadFile, UploadPhase};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::ErrorKind;
use crate::lock;

/// Shown after any failed upload.
pub const UPLOAD_FAILED_MESSAGE: &str =
    "Failed to upload the document. Please try again or the document is corrupted.";

/// Notified once per successful upload.
#[async_trait]
pub trait UploadCompletion: Send + Sync {
    async fn upload_completed(&self, document: &Document);
}

/// Why a drop did not start an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropIgnored {
    /// The drop carried no files.
    NoFiles,
    /// An upload is already in flight.
    Busy,
}

/// Result of [`UploadPipeline::drop_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(Document),
    Failed { kind: ErrorKind, message: String },
    Ignored(DropIgnored),
    /// The pipeline was reset while the request was outstanding.
    Discarded,
}

#[derive(Debug, Default)]
struct UploadState {
    phase: UploadPhase,
    title: Option<String>,
    error: Option<String>,
    epoch: u64,
}

#[derive(Clone)]
pub struct UploadPipeline {
    api: ApiClient,
    events: EventBus,
    completion: Arc<dyn UploadCompletion>,
    state: Arc<Mutex<UploadState>>,
}

impl UploadPipeline {
    pub fn new(api: ApiClient, events: EventBus, completion: Arc<dyn UploadCompletion>) -> Self {
        Self {
            api,
            events,
            completion,
            state: Arc::new(Mutex::new(UploadState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, UploadState> {
        lock(&self.state)
    }

    /// Upload the first of `files`. Ignored while another upload is running.
    pub async fn drop_files(&self, files: Vec<UploadFile>) -> UploadOutcome {
        let (file, epoch) = {
            let mut state = self.state();
            if !state.phase.can_transition_to(&UploadPhase::Uploading) {
                debug!(phase = %state.phase, "Drop ignored; upload in flight");
                return UploadOutcome::Ignored(DropIgnored::Busy);
            }
            let Some(file) = files.into_iter().next() else {
                return UploadOutcome::Ignored(DropIgnored::NoFiles);
            };
            state.phase = UploadPhase::Uploading;
            state.title = Some(file.title().to_string());
            state.error = None;
            (file, state.epoch)
        };
        self.phase_changed(UploadPhase::Uploading);
        debug!(title = %file.title(), bytes = file.bytes.len(), "Upload started");

        let result = self.api.create_document(&file).await;

        let next = match &result {
            Ok(_) => UploadPhase::Idle,
            Err(_) => UploadPhase::Error,
        };
        {
            let mut state = self.state();
            if state.epoch != epoch {
                debug!(title = %file.title(), "Discarding upload result after reset");
                return UploadOutcome::Discarded;
            }
            state.phase = next;
            state.title = None;
            if next == UploadPhase::Error {
                state.error = Some(UPLOAD_FAILED_MESSAGE.to_string());
            }
        }
        self.phase_changed(next);

        match result {
            Ok(document) => {
                info!(document_id = %document.id, title = %document.title, "Document uploaded");
                self.completion.upload_completed(&document).await;
                UploadOutcome::Uploaded(document)
            }
            Err(e) => {
                warn!(title = %file.title(), error = %e, "Upload failed");
                UploadOutcome::Failed {
                    kind: e.kind(),
                    message: UPLOAD_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }

    /// Back to idle. An outstanding upload's result is dropped.
    pub fn reset(&self) {
        let mut state = self.state();
        let epoch = state.epoch.wrapping_add(1);
        let was = state.phase;
        *state = UploadState {
            epoch,
            ..UploadState::default()
        };
        drop(state);
        if was != UploadPhase::Idle {
            self.phase_changed(UploadPhase::Idle);
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.state().phase
    }

    pub fn is_uploading(&self) -> bool {
        self.phase() == UploadPhase::Uploading
    }

    /// Title of the file currently being uploaded.
    pub fn current_title(&self) -> Option<String> {
        self.state().title.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    fn phase_changed(&self, phase: UploadPhase) {
        self.events
            .publish(ClientEvent::UploadPhaseChanged { phase });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::ClientError;
    use crate::session::SessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCompletion {
        calls: AtomicUsize,
        last: Mutex<Option<Document>>,
    }

    #[async_trait]
    impl UploadCompletion for CountingCompletion {
        async fn upload_completed(&self, document: &Document) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *lock(&self.last) = Some(document.clone());
        }
    }

    fn pipeline(backend: Arc<MockBackend>) -> (UploadPipeline, Arc<CountingCompletion>) {
        let events = EventBus::default();
        let session = Arc::new(SessionStore::in_memory(events.clone()));
        session.set_token("t").unwrap();
        let completion = Arc::new(CountingCompletion::default());
        let pipeline = UploadPipeline::new(
            ApiClient::new(backend, session),
            events,
            Arc::clone(&completion) as Arc<dyn UploadCompletion>,
        );
        (pipeline, completion)
    }

    fn file(name: &str) -> UploadFile {
        UploadFile::new(name, b"%PDF-1.4".to_vec())
    }

    #[tokio::test]
    async fn test_success_goes_idle_and_notifies_once() {
        let backend = Arc::new(MockBackend::new());
        let (upload, completion) = pipeline(Arc::clone(&backend));

        let outcome = upload.drop_files(vec![file("report.pdf")]).await;
        assert_eq!(outcome, UploadOutcome::Uploaded(Document::new(1, "report.pdf")));
        assert_eq!(upload.phase(), UploadPhase::Idle);
        assert!(upload.error().is_none());
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            lock(&completion.last).clone(),
            Some(Document::new(1, "report.pdf"))
        );
    }

    #[tokio::test]
    async fn test_only_first_file_is_used() {
        let backend = Arc::new(MockBackend::new());
        let (upload, _) = pipeline(Arc::clone(&backend));

        upload
            .drop_files(vec![file("first.txt"), file("second.txt")])
            .await;
        let sent = backend.uploads();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title(), "first.txt");
    }

    #[tokio::test]
    async fn test_empty_drop_is_ignored() {
        let backend = Arc::new(MockBackend::new());
        let (upload, completion) = pipeline(Arc::clone(&backend));

        assert_eq!(
            upload.drop_files(Vec::new()).await,
            UploadOutcome::Ignored(DropIgnored::NoFiles)
        );
        assert_eq!(upload.phase(), UploadPhase::Idle);
        assert_eq!(backend.upload_calls(), 0);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_while_uploading_starts_nothing() {
        let backend = Arc::new(MockBackend::new());
        backend.hold_uploads();
        let (upload, completion) = pipeline(Arc::clone(&backend));

        let first = {
            let upload = upload.clone();
            tokio::spawn(async move { upload.drop_files(vec![file("a.txt")]).await })
        };
        while backend.upload_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(upload.is_uploading());
        assert_eq!(upload.current_title().as_deref(), Some("a.txt"));

        assert_eq!(
            upload.drop_files(vec![file("b.txt")]).await,
            UploadOutcome::Ignored(DropIgnored::Busy)
        );
        assert_eq!(backend.upload_calls(), 1);

        backend.release_upload();
        assert!(matches!(first.await.unwrap(), UploadOutcome::Uploaded(_)));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_sets_error_and_allows_retry() {
        let backend = Arc::new(MockBackend::new());
        backend.push_upload_response(Err(ClientError::Server {
            status: 422,
            body: "bad file".into(),
        }));
        let (upload, completion) = pipeline(Arc::clone(&backend));

        let outcome = upload.drop_files(vec![file("broken.pdf")]).await;
        assert_eq!(
            outcome,
            UploadOutcome::Failed {
                kind: ErrorKind::Network,
                message: UPLOAD_FAILED_MESSAGE.to_string()
            }
        );
        assert_eq!(upload.phase(), UploadPhase::Error);
        assert_eq!(upload.error().as_deref(), Some(UPLOAD_FAILED_MESSAGE));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
        // No automatic retry.
        assert_eq!(backend.upload_calls(), 1);

        let retry = upload.drop_files(vec![file("fixed.pdf")]).await;
        assert!(matches!(retry, UploadOutcome::Uploaded(_)));
        assert_eq!(upload.phase(), UploadPhase::Idle);
        assert!(upload.error().is_none());
    }

    #[tokio::test]
    async fn test_reset_discards_outstanding_upload() {
        let backend = Arc::new(MockBackend::new());
        backend.hold_uploads();
        let (upload, completion) = pipeline(Arc::clone(&backend));

        let task = {
            let upload = upload.clone();
            tokio::spawn(async move { upload.drop_files(vec![file("a.txt")]).await })
        };
        while backend.upload_calls() == 0 {
            tokio::task::yield_now().await;
        }
        upload.reset();
        assert_eq!(upload.phase(), UploadPhase::Idle);

        backend.release_upload();
        assert_eq!(task.await.unwrap(), UploadOutcome::Discarded);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_phase_events() {
        let backend = Arc::new(MockBackend::new());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let session = Arc::new(SessionStore::in_memory(EventBus::default()));
        session.set_token("t").unwrap();
        let upload = UploadPipeline::new(
            ApiClient::new(backend, session),
            events,
            Arc::new(CountingCompletion::default()),
        );

        upload.drop_files(vec![file("a.txt")]).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::UploadPhaseChanged {
                phase: UploadPhase::Uploading
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::UploadPhaseChanged {
                phase: UploadPhase::Idle
            }
        );
    }
}
