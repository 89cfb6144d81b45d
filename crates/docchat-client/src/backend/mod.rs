//! Backend transport trait and implementations.
//!
//! - `HttpBackend` talks to the REST backend over reqwest.
//! - `MockBackend` replays scripted responses for tests.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use docchat_core::{ChatReply, ChatRequest, Document, UploadFile};

use crate::error::ClientError;

pub use http::HttpBackend;
pub use mock::MockBackend;

/// Request/response contract of the document and chat backend.
///
/// Every call is protected; the caller supplies the bearer token. A rejected
/// credential must surface as [`ClientError::Unauthorized`].
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// `GET /documents/`
    async fn list_documents(&self, token: &str) -> Result<Vec<Document>, ClientError>;

    /// `POST /documents/` as multipart with `file` and `title` parts.
    async fn create_document(
        &self,
        token: &str,
        file: &UploadFile,
    ) -> Result<Document, ClientError>;

    /// `POST /chat`
    async fn send_chat(&self, token: &str, request: &ChatRequest)
        -> Result<ChatReply, ClientError>;
}
