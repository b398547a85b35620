//! Mock build backend for testing.
//!
//! Provides a configurable mock implementation of the BuildBackend trait
//! for use in unit tests without a running API server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::backend::BuildBackend;
use crate::error::{ClientError, ClientResult};
use crate::types::{ChatRequest, ChatResponse, TemplateRequest, TemplateResponse};

/// Which endpoint a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Template,
    Chat,
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub enum CapturedCall {
    Template(TemplateRequest),
    Chat(ChatRequest),
}

impl CapturedCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Template(_) => Endpoint::Template,
            Self::Chat(_) => Endpoint::Chat,
        }
    }
}

/// Mock build backend.
///
/// Responses are served in order, cycling when exhausted. With no queued
/// response an empty one is returned.
#[derive(Clone, Default)]
pub struct MockBackend {
    templates: Arc<RwLock<Vec<TemplateResponse>>>,
    template_index: Arc<AtomicUsize>,
    chats: Arc<RwLock<Vec<ChatResponse>>>,
    chat_index: Arc<AtomicUsize>,
    /// Simulated latency applied to every call.
    delay: Arc<RwLock<Option<Duration>>>,
    template_failure: Arc<RwLock<Option<String>>>,
    chat_failure: Arc<RwLock<Option<String>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template response.
    pub fn add_template(self, response: TemplateResponse) -> Self {
        self.templates.write().push(response);
        self
    }

    /// Add a chat response.
    pub fn add_chat(self, response: ChatResponse) -> Self {
        self.chats.write().push(response);
        self
    }

    /// Delay every call by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    /// Make the template endpoint fail.
    pub fn fail_template(self, message: impl Into<String>) -> Self {
        *self.template_failure.write() = Some(message.into());
        self
    }

    /// Make the chat endpoint fail.
    pub fn fail_chat(self, message: impl Into<String>) -> Self {
        *self.chat_failure.write() = Some(message.into());
        self
    }

    /// Stop failing the chat endpoint; used to exercise retries.
    pub fn clear_chat_failure(&self) {
        *self.chat_failure.write() = None;
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Endpoints in the order they were called.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.captured_calls
            .read()
            .iter()
            .map(CapturedCall::endpoint)
            .collect()
    }

    /// Chat requests received so far.
    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.captured_calls
            .read()
            .iter()
            .filter_map(|c| match c {
                CapturedCall::Chat(req) => Some(req.clone()),
                CapturedCall::Template(_) => None,
            })
            .collect()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next<T: Clone + Default>(queue: &RwLock<Vec<T>>, index: &AtomicUsize) -> T {
        let items = queue.read();
        if items.is_empty() {
            return T::default();
        }
        let i = index.fetch_add(1, Ordering::SeqCst);
        items.get(i % items.len()).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl BuildBackend for MockBackend {
    async fn classify_template(&self, request: &TemplateRequest) -> ClientResult<TemplateResponse> {
        self.record_call(CapturedCall::Template(request.clone()));
        self.simulate_latency().await;

        if let Some(msg) = self.template_failure.read().clone() {
            return Err(ClientError::Simulated(msg));
        }
        Ok(Self::next(&self.templates, &self.template_index))
    }

    async fn generate(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
        self.record_call(CapturedCall::Chat(request.clone()));
        self.simulate_latency().await;

        if let Some(msg) = self.chat_failure.read().clone() {
            return Err(ClientError::Simulated(msg));
        }
        Ok(Self::next(&self.chats, &self.chat_index))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
