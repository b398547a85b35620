//! Backend trait for the template and chat endpoints.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::{ChatRequest, ChatResponse, TemplateRequest, TemplateResponse};

/// Trait for build backends.
///
/// The template call classifies the prompt and returns the scaffold; the chat
/// call produces the rest of the project. Callers always issue the template
/// call first.
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Classify a prompt and fetch the matching project template.
    async fn classify_template(&self, request: &TemplateRequest) -> ClientResult<TemplateResponse>;

    /// Generate build output for the accumulated conversation.
    async fn generate(&self, request: &ChatRequest) -> ClientResult<ChatResponse>;

    /// Backend name, for logging.
    fn name(&self) -> &str;
}
