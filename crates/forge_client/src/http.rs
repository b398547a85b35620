//! HTTP backend.
//!
//! Talks to the SiteForge API. The API authenticates with an opaque session
//! cookie, so the client keeps a cookie store and creates the session lazily
//! before the first real call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::backend::BuildBackend;
use crate::error::{ClientError, ClientResult};
use crate::types::{ChatRequest, ChatResponse, TemplateRequest, TemplateResponse};

pub const SESSION_PATH: &str = "/api/session";
pub const TEMPLATE_PATH: &str = "/api/template";
pub const CHAT_PATH: &str = "/api/chat";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// reqwest-backed [`BuildBackend`].
pub struct HttpBackend {
    client: Client,
    base_url: String,
    session: OnceCell<()>,
}

impl HttpBackend {
    /// Create a backend for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::with_timeout(base_url, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Create a backend with an explicit request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            session: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Create the server session once; the cookie store keeps the credential.
    async fn ensure_session(&self) -> ClientResult<()> {
        self.session
            .get_or_try_init(|| async {
                let url = self.url(SESSION_PATH);
                debug!("Creating API session at {}", url);
                let response = self.client.post(&url).send().await?;
                check_status(response).await?;
                info!("API session established");
                Ok::<(), ClientError>(())
            })
            .await?;
        Ok(())
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.ensure_session().await?;

        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        let response = check_status(response).await?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl BuildBackend for HttpBackend {
    async fn classify_template(&self, request: &TemplateRequest) -> ClientResult<TemplateResponse> {
        self.post_json(TEMPLATE_PATH, request).await
    }

    async fn generate(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
        self.post_json(CHAT_PATH, request).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Map a non-success response to [`ClientError::Status`].
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason().unwrap_or("request failed")),
    })
}

/// Pull the `error` or `message` field out of an error body.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                fallback.to_string()
            } else {
                trimmed.to_string()
            }
        })
}
