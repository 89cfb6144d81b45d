//! Error types for the document/chat client.
//!
//! Local input problems are not errors here: components report them as
//! `Ignored` outcomes and issue no request.

/// User-facing class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or rejected credential. Clears the session.
    Auth,
    /// Transport or server failure. Retryable, never clears the session.
    Network,
}

/// Errors from the client components and the backend transport.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not authenticated: {0}")]
    Unauthorized(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Unauthorized(_) => ErrorKind::Auth,
            ClientError::Network(_)
            | ClientError::Server { .. }
            | ClientError::UnexpectedFormat(_) => ErrorKind::Network,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ClientError::Unauthorized(if body.is_empty() {
                format!("status {}", status)
            } else {
                body
            }),
            _ => ClientError::Server { status, body },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::UnexpectedFormat(err.to_string());
        }
        if let Some(status) = err.status() {
            return ClientError::from_status(status.as_u16(), err.to_string());
        }
        ClientError::Network(err.to_string())
    }
}
