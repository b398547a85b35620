//! Step sources feed build steps into a session machine.

use async_trait::async_trait;

use forge_core::BuildStep;

use crate::error::SessionResult;

/// First batch of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapBatch {
    pub steps: Vec<BuildStep>,
    /// Whether a follow-up generation call should be made
    pub generate: bool,
}

impl BootstrapBatch {
    pub fn new(steps: Vec<BuildStep>, generate: bool) -> Self {
        Self { steps, generate }
    }
}

/// Provider of build steps for one prompt.
///
/// `bootstrap` is always awaited before `generate`. Step ids in returned
/// batches are reassigned by the machine.
#[async_trait]
pub trait StepSource: Send + Sync {
    /// Fetch the scaffold batch.
    async fn bootstrap(&self, prompt: &str) -> SessionResult<BootstrapBatch>;

    /// Fetch a follow-up batch.
    async fn generate(&self, prompt: &str) -> SessionResult<Vec<BuildStep>>;
}
