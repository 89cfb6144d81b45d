use std::time::Duration;

use async_trait::async_trait;
use docchat_core::config::ApiConfig;
use docchat_core::{ChatReply, ChatRequest, Document, UploadFile};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use tracing::debug;

use super::DocumentBackend;
use crate::error::ClientError;

/// HTTP backend over a fixed base URL.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success response into a classified error.
async fn check(resp: Response, what: &str) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!(status = %status, "{what} failed: {body}");
    Err(ClientError::from_status(status.as_u16(), body))
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    async fn list_documents(&self, token: &str) -> Result<Vec<Document>, ClientError> {
        let resp = self
            .http
            .get(self.url("/documents/"))
            .bearer_auth(token)
            .send()
            .await?;
        let resp = check(resp, "GET /documents/").await?;

        let body: serde_json::Value = resp.json().await?;
        if !body.is_array() {
            return Err(ClientError::UnexpectedFormat(format!(
                "expected a document array, got {}",
                body
            )));
        }
        serde_json::from_value(body).map_err(|e| ClientError::UnexpectedFormat(e.to_string()))
    }

    async fn create_document(
        &self,
        token: &str,
        file: &UploadFile,
    ) -> Result<Document, ClientError> {
        let form = Form::new()
            .part(
                "file",
                Part::bytes(file.bytes.clone()).file_name(file.file_name.clone()),
            )
            .text("title", file.title().to_string());

        let resp = self
            .http
            .post(self.url("/documents/"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let resp = check(resp, "POST /documents/").await?;
        Ok(resp.json().await?)
    }

    async fn send_chat(
        &self,
        token: &str,
        request: &ChatRequest,
    ) -> Result<ChatReply, ClientError> {
        let resp = self
            .http
            .post(self.url("/chat"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        let resp = check(resp, "POST /chat").await?;
        Ok(resp.json().await?)
    }
}
