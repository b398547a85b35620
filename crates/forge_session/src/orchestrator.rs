//! Orchestration over the template and chat endpoints.
//!
//! The template call classifies the prompt and returns a scaffold plus the
//! context prompts; the chat call receives that context followed by the user
//! prompt. The template call always happens first.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use forge_client::{BuildBackend, ChatRequest, TemplateRequest};
use forge_core::{parse_build_steps, BuildSession, BuildStep};

use crate::config::ForgeConfig;
use crate::error::{SessionError, SessionResult};
use crate::machine::{BuildSessionMachine, BuildState};
use crate::observer::SessionObserver;
use crate::services::Services;
use crate::source::{BootstrapBatch, StepSource};

/// [`StepSource`] backed by a [`BuildBackend`].
pub struct TemplateChatSource {
    backend: Arc<dyn BuildBackend>,
    /// Context prompts from the last template call
    context: Mutex<Vec<String>>,
}

impl TemplateChatSource {
    pub fn new(backend: Arc<dyn BuildBackend>) -> Self {
        Self {
            backend,
            context: Mutex::new(Vec::new()),
        }
    }

    /// Context prompts that will precede the user prompt in chat requests.
    pub fn context(&self) -> Vec<String> {
        self.context.lock().clone()
    }
}

#[async_trait]
impl StepSource for TemplateChatSource {
    async fn bootstrap(&self, prompt: &str) -> SessionResult<BootstrapBatch> {
        let request = TemplateRequest::new(prompt.trim());
        debug!(backend = self.backend.name(), "Requesting template");

        let template = self
            .backend
            .classify_template(&request)
            .await
            .map_err(|e| SessionError::Template(e.to_string()))?;

        let steps = parse_build_steps(template.scaffold());
        let generate = !template.prompts.is_empty();
        info!(
            steps = steps.len(),
            context_prompts = template.prompts.len(),
            "Template received"
        );

        *self.context.lock() = template.prompts;
        Ok(BootstrapBatch::new(steps, generate))
    }

    async fn generate(&self, prompt: &str) -> SessionResult<Vec<BuildStep>> {
        let request = ChatRequest::from_context(self.context(), prompt.trim());
        debug!(
            backend = self.backend.name(),
            messages = request.messages.len(),
            "Requesting generation"
        );

        let response = self
            .backend
            .generate(&request)
            .await
            .map_err(|e| SessionError::Generation(e.to_string()))?;

        let steps = parse_build_steps(response.text());
        info!(steps = steps.len(), "Generation received");
        Ok(steps)
    }
}

/// A session machine wired to a template/chat backend.
pub struct Orchestrator {
    machine: BuildSessionMachine,
    source: TemplateChatSource,
}

impl Orchestrator {
    pub fn new(prompt: impl Into<String>, backend: Arc<dyn BuildBackend>, services: Services) -> Self {
        Self::from_config(prompt, backend, services, &ForgeConfig::default())
    }

    pub fn from_config(
        prompt: impl Into<String>,
        backend: Arc<dyn BuildBackend>,
        services: Services,
        config: &ForgeConfig,
    ) -> Self {
        let machine = BuildSessionMachine::new(prompt, config.session.clone(), services)
            .with_environment(config.environment.clone());
        Self {
            machine,
            source: TemplateChatSource::new(backend),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.machine = self.machine.with_observer(observer);
        self
    }

    /// Run the template call, then generation when the template asks for it.
    pub async fn run(&self) -> BuildSession {
        self.machine.start_session(&self.source).await
    }

    pub async fn retry(&self) -> SessionResult<()> {
        self.machine.retry_chat(&self.source).await
    }

    pub fn cancel(&self) -> Option<BuildSession> {
        self.machine.cancel_session()
    }

    pub fn subscribe(&self) -> watch::Receiver<BuildState> {
        self.machine.subscribe()
    }

    pub fn state(&self) -> BuildState {
        self.machine.state()
    }

    /// Handle to the underlying machine, for cancellation from another task
    /// and for direct step and file edits.
    pub fn machine(&self) -> &BuildSessionMachine {
        &self.machine
    }

    pub fn source(&self) -> &TemplateChatSource {
        &self.source
    }
}
