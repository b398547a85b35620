//! Session observer hooks.

use forge_core::BuildSession;

use crate::error::SessionError;

/// Receives session snapshots and routed errors.
///
/// Hooks are called after the machine releases its state lock, so an
/// observer may call back into the machine.
#[cfg_attr(test, mockall::automock)]
pub trait SessionObserver: Send + Sync {
    /// Called with the new snapshot after every session change.
    fn on_session_update(&self, _session: &BuildSession) {}

    /// Called when a collaborator failure is routed to the error channel.
    fn on_error(&self, _error: &SessionError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
