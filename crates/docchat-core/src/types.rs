use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Newtype Wrappers - Identity
// =============================================================================

/// Server-assigned document identifier. Unique and immutable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally generated message identifier.
///
/// Drawn from a monotonically increasing counter owned by the conversation,
/// so user and assistant ids never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Typed by the signed-in user.
    User,
    /// Returned by the assistant backend.
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// Lifecycle phase of the upload pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    /// Ready to accept a file.
    #[default]
    Idle,
    /// One upload request is in flight.
    Uploading,
    /// The last attempt failed; a new drop is accepted.
    Error,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Idle => write!(f, "idle"),
            UploadPhase::Uploading => write!(f, "uploading"),
            UploadPhase::Error => write!(f, "error"),
        }
    }
}

impl UploadPhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &UploadPhase) -> bool {
        matches!(
            (self, target),
            (UploadPhase::Idle, UploadPhase::Uploading)
                | (UploadPhase::Uploading, UploadPhase::Idle)
                | (UploadPhase::Uploading, UploadPhase::Error)
                // Retry is always user-initiated
                | (UploadPhase::Error, UploadPhase::Uploading)
        )
    }
}

// =============================================================================
// Entity Structs
// =============================================================================

/// A document as listed by the backend.
///
/// Never mutated client-side; a refresh replaces the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
}

impl Document {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: DocumentId(id),
            title: title.into(),
        }
    }
}

/// One entry of a conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
}

/// Snapshot of the authentication credential.
///
/// Presence of `token` is the only authority for "authenticated".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

// =============================================================================
// Wire Bodies
// =============================================================================

/// Body returned by the sign-in and sign-up endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub document_id: DocumentId,
    pub message: String,
}

/// Body returned by `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// A file picked or dropped for upload. The title is the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn title(&self) -> &str {
        &self.file_name
    }
}

// =============================================================================
// Tests
// =============================================================================
