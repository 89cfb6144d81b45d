//! In-process fake backend for tests.
//!
//! Behaves like a tiny document server by default: uploads append to an
//! in-memory collection, listing returns it, chat echoes the message. Tests
//! can script individual responses and hold any call kind in flight until
//! they release it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docchat_core::{ChatReply, ChatRequest, Document, DocumentId, UploadFile};
use tokio::sync::Semaphore;

use super::DocumentBackend;
use crate::error::ClientError;
use crate::lock;

/// Holds calls of one kind until permits are released.
#[derive(Default)]
struct Gate {
    semaphore: Mutex<Option<Arc<Semaphore>>>,
}

impl Gate {
    fn hold(&self) {
        *lock(&self.semaphore) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Stop holding; later calls pass straight through.
    fn open(&self) {
        // Closing wakes waiters with an error, which `pass` treats as go.
        if let Some(sem) = lock(&self.semaphore).take() {
            sem.close();
        }
    }

    fn release(&self, calls: usize) {
        if let Some(sem) = lock(&self.semaphore).as_ref() {
            sem.add_permits(calls);
        }
    }

    async fn pass(&self) {
        let sem = lock(&self.semaphore).clone();
        if let Some(sem) = sem {
            if let Ok(permit) = sem.acquire().await {
                permit.forget();
            }
        }
    }
}

/// Scripted, stateful backend double.
#[derive(Default)]
pub struct MockBackend {
    documents: Mutex<Vec<Document>>,
    next_id: AtomicI64,
    accepted_token: Mutex<Option<String>>,

    list_script: Mutex<VecDeque<Result<Vec<Document>, ClientError>>>,
    upload_script: Mutex<VecDeque<Result<Document, ClientError>>>,
    chat_script: Mutex<VecDeque<Result<ChatReply, ClientError>>>,

    list_gate: Gate,
    upload_gate: Gate,
    chat_gate: Gate,

    list_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    chat_calls: AtomicUsize,
    chat_requests: Mutex<Vec<ChatRequest>>,
    uploads: Mutex<Vec<UploadFile>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Start with an existing server-side collection.
    pub fn with_documents(documents: Vec<Document>) -> Self {
        let next = documents.iter().map(|d| d.id.0).max().unwrap_or(0) + 1;
        let backend = Self::new();
        *lock(&backend.documents) = documents;
        backend.next_id.store(next, Ordering::SeqCst);
        backend
    }

    /// Reject every token except `token` with 401.
    pub fn accept_only(&self, token: &str) {
        *lock(&self.accepted_token) = Some(token.to_string());
    }

    /// Replace the server-side collection (simulates deletions elsewhere).
    pub fn set_documents(&self, documents: Vec<Document>) {
        *lock(&self.documents) = documents;
    }

    pub fn push_list_response(&self, response: Result<Vec<Document>, ClientError>) {
        lock(&self.list_script).push_back(response);
    }

    pub fn push_upload_response(&self, response: Result<Document, ClientError>) {
        lock(&self.upload_script).push_back(response);
    }

    pub fn push_chat_response(&self, response: Result<ChatReply, ClientError>) {
        lock(&self.chat_script).push_back(response);
    }

    pub fn hold_list(&self) {
        self.list_gate.hold();
    }

    pub fn release_list(&self) {
        self.list_gate.release(1);
    }

    /// Release every held list call and stop holding new ones.
    pub fn open_list(&self) {
        self.list_gate.open();
    }

    pub fn hold_uploads(&self) {
        self.upload_gate.hold();
    }

    pub fn release_upload(&self) {
        self.upload_gate.release(1);
    }

    pub fn open_uploads(&self) {
        self.upload_gate.open();
    }

    pub fn hold_chat(&self) {
        self.chat_gate.hold();
    }

    pub fn release_chat(&self) {
        self.chat_gate.release(1);
    }

    pub fn open_chat(&self) {
        self.chat_gate.open();
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        lock(&self.chat_requests).clone()
    }

    pub fn uploads(&self) -> Vec<UploadFile> {
        lock(&self.uploads).clone()
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        lock(&self.tokens_seen).clone()
    }

    fn authorize(&self, token: &str) -> Result<(), ClientError> {
        lock(&self.tokens_seen).push(token.to_string());
        match lock(&self.accepted_token).as_deref() {
            Some(accepted) if accepted != token => {
                Err(ClientError::Unauthorized("invalid token".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentBackend for MockBackend {
    async fn list_documents(&self, token: &str) -> Result<Vec<Document>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list_gate.pass().await;
        self.authorize(token)?;
        if let Some(scripted) = lock(&self.list_script).pop_front() {
            return scripted;
        }
        Ok(lock(&self.documents).clone())
    }

    async fn create_document(
        &self,
        token: &str,
        file: &UploadFile,
    ) -> Result<Document, ClientError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.uploads).push(file.clone());
        self.upload_gate.pass().await;
        self.authorize(token)?;
        if let Some(scripted) = lock(&self.upload_script).pop_front() {
            return scripted;
        }
        let document = Document {
            id: DocumentId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            title: file.title().to_string(),
        };
        lock(&self.documents).push(document.clone());
        Ok(document)
    }

    async fn send_chat(
        &self,
        token: &str,
        request: &ChatRequest,
    ) -> Result<ChatReply, ClientError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.chat_requests).push(request.clone());
        self.chat_gate.pass().await;
        self.authorize(token)?;
        if let Some(scripted) = lock(&self.chat_script).pop_front() {
            return scripted;
        }
        Ok(ChatReply {
            reply: format!("echo: {}", request.message),
        })
    }
}
