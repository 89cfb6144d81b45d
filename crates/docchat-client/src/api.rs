//! Authenticated access to the backend.
//!
//! Reads the bearer token from the session store for every call and clears
//! the session when the backend rejects it. Components never talk to a
//! [`DocumentBackend`] directly.

use std::sync::Arc;

use docchat_core::{ChatReply, ChatRequest, Document, UploadFile};

use crate::backend::DocumentBackend;
use crate::error::ClientError;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct ApiClient {
    backend: Arc<dyn DocumentBackend>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(backend: Arc<dyn DocumentBackend>, session: Arc<SessionStore>) -> Self {
        Self { backend, session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>, ClientError> {
        let token = self.token()?;
        let result = self.backend.list_documents(&token).await;
        self.observe(&token, result)
    }

    pub async fn create_document(&self, file: &UploadFile) -> Result<Document, ClientError> {
        let token = self.token()?;
        let result = self.backend.create_document(&token, file).await;
        self.observe(&token, result)
    }

    pub async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
        let token = self.token()?;
        let result = self.backend.send_chat(&token, request).await;
        self.observe(&token, result)
    }

    fn token(&self) -> Result<String, ClientError> {
        self.session
            .token()
            .ok_or_else(|| ClientError::Unauthorized("no session token".to_string()))
    }

    /// Clear the session on an auth failure, unless `token` was replaced
    /// while the request was outstanding.
    fn observe<T>(&self, token: &str, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            if e.is_auth() {
                self.session.invalidate(token, &e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use docchat_core::EventBus;

    fn client(backend: Arc<MockBackend>) -> ApiClient {
        let session = Arc::new(SessionStore::in_memory(EventBus::default()));
        ApiClient::new(backend, session)
    }

    #[tokio::test]
    async fn test_token_is_presented() {
        let backend = Arc::new(MockBackend::new());
        let api = client(Arc::clone(&backend));
        api.session().set_token("tok-1").unwrap();

        api.list_documents().await.unwrap();
        assert_eq!(backend.tokens_seen(), vec!["tok-1"]);
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let backend = Arc::new(MockBackend::new());
        let api = client(Arc::clone(&backend));

        let err = api.list_documents().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(backend.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_clears_session() {
        let backend = Arc::new(MockBackend::new());
        backend.accept_only("valid");
        let api = client(Arc::clone(&backend));
        api.session().set_token("stale").unwrap();

        let err = api.list_documents().await.unwrap_err();
        assert!(err.is_auth());
        assert!(!api.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_late_rejection_keeps_newer_token() {
        let backend = Arc::new(MockBackend::new());
        backend.accept_only("new");
        backend.hold_list();
        let api = client(Arc::clone(&backend));
        api.session().set_token("old").unwrap();

        let pending = {
            let api = api.clone();
            tokio::spawn(async move { api.list_documents().await })
        };
        while backend.list_calls() == 0 {
            tokio::task::yield_now().await;
        }
        api.session().set_token("new").unwrap();
        backend.release_list();

        let err = pending.await.unwrap().unwrap_err();
        assert!(err.is_auth());
        assert_eq!(api.session().token().as_deref(), Some("new"));
        assert_eq!(backend.tokens_seen(), vec!["old"]);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_session() {
        let backend = Arc::new(MockBackend::new());
        backend.push_list_response(Err(ClientError::Network("reset".into())));
        let api = client(Arc::clone(&backend));
        api.session().set_token("valid").unwrap();

        assert!(api.list_documents().await.is_err());
        assert!(api.session().is_authenticated());
    }
}
