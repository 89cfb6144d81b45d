//! Client-side session and conversation state for docchat.
//!
//! Gates navigation on the session token, owns the document list and the
//! current selection, keeps the per-document chat log and runs uploads.
//! Everything talks to the server through a [`DocumentBackend`].

pub mod api;
pub mod backend;
pub mod conversation;
pub mod dashboard;
pub mod documents;
pub mod error;
pub mod gate;
pub mod session;
pub mod upload;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use api::ApiClient;
pub use backend::{DocumentBackend, HttpBackend, MockBackend};
pub use conversation::{ConversationSession, IgnoreReason, SendOutcome};
pub use dashboard::{Dashboard, EMPTY_STATE_MESSAGE};
pub use documents::{DocumentStore, RefreshOutcome, Selection};
pub use error::{ClientError, ErrorKind};
pub use gate::{is_reachable, navigate, Navigation, Route, RouteClass, SessionGate};
pub use session::SessionStore;
pub use upload::{DropIgnored, UploadCompletion, UploadOutcome, UploadPipeline};

/// Lock a component's state, recovering from a poisoned mutex.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
