//! Build session state machine.
//!
//! The machine owns one [`BuildSession`] at a time together with the derived
//! UI state ([`BuildState`]). All state lives behind a single mutex that is
//! never held across an `.await`; every change publishes one snapshot on a
//! watch channel and then notifies the observer with the lock released.
//!
//! Two timers run as tokio tasks: the chat countdown and the cosmetic
//! progress ramp. Each timer carries an epoch; a tick whose epoch no longer
//! matches is ignored, so a stopped timer can never write state.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use forge_core::{
    apply_pending_steps, BuildSession, BuildStep, FileItem, FilePatch, NewFile, NewStep,
    SessionMetadata, SessionStatus, StepId, StepPatch, StepType,
};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::observer::{NoopObserver, SessionObserver};
use crate::progress;
use crate::services::{Services, Severity};
use crate::source::StepSource;

/// Snapshot of the session and its derived UI state.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildState {
    pub session: Option<BuildSession>,
    /// True while `start_session` is running
    pub loading: bool,
    /// Message of the last routed collaborator failure
    pub error: Option<String>,
    /// True while the progress ramp is running
    pub is_building: bool,
    pub build_progress: u8,
    pub chat_loading: bool,
    pub chat_timed_out: bool,
    pub remaining_seconds: u32,
}

impl BuildState {
    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| s.status)
    }
}

#[derive(Default)]
struct Timer {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.epoch += 1;
    }

    /// Stop any running task and return the epoch for the next one.
    fn rearm(&mut self) -> u64 {
        self.stop();
        self.epoch
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

struct Inner {
    build: BuildState,
    environment: String,
    observer: Arc<dyn SessionObserver>,
    next_step_id: StepId,
    generation_requested: bool,
    generation_succeeded: bool,
    chat_in_flight: usize,
    ramp: Vec<u8>,
    ramp_cursor: usize,
    countdown: Timer,
    progress: Timer,
}

impl Inner {
    fn current_id(&self) -> Option<&str> {
        self.build.session.as_ref().map(|s| s.id.as_str())
    }

    /// Whether `session_id` is the current session and still accepts results.
    fn accepts(&self, session_id: &str) -> bool {
        self.build
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id && s.is_active())
    }

    fn stop_timers(&mut self) {
        self.countdown.stop();
        self.progress.stop();
    }
}

struct Shared {
    prompt: String,
    config: SessionConfig,
    services: Services,
    inner: Mutex<Inner>,
    updates: watch::Sender<BuildState>,
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.build.clone());
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.inner.get_mut().stop_timers();
    }
}

/// Work to do after the state lock is released.
#[must_use]
struct Notice {
    observer: Arc<dyn SessionObserver>,
    session: Option<BuildSession>,
    error: Option<SessionError>,
}

impl Notice {
    fn session(inner: &Inner) -> Self {
        Self {
            observer: inner.observer.clone(),
            session: inner.build.session.clone(),
            error: None,
        }
    }

    fn deliver(self) {
        if let Some(error) = &self.error {
            self.observer.on_error(error);
        }
        if let Some(session) = &self.session {
            self.observer.on_session_update(session);
        }
    }
}

/// Drives one build session from prompt to completed file tree.
///
/// Cloning yields another handle to the same machine, so a session can be
/// cancelled from one task while another awaits `start_session`.
#[derive(Clone)]
pub struct BuildSessionMachine {
    shared: Arc<Shared>,
}

impl BuildSessionMachine {
    pub fn new(prompt: impl Into<String>, config: SessionConfig, services: Services) -> Self {
        let (updates, _) = watch::channel(BuildState {
            remaining_seconds: config.chat_window_secs,
            ..BuildState::default()
        });

        let inner = Inner {
            build: updates.borrow().clone(),
            environment: SessionMetadata::default().environment,
            observer: Arc::new(NoopObserver),
            next_step_id: 0,
            generation_requested: false,
            generation_succeeded: false,
            chat_in_flight: 0,
            ramp: Vec::new(),
            ramp_cursor: 0,
            countdown: Timer::default(),
            progress: Timer::default(),
        };

        Self {
            shared: Arc::new(Shared {
                prompt: prompt.into(),
                config,
                services,
                inner: Mutex::new(inner),
                updates,
            }),
        }
    }

    /// Install the observer that receives session updates and errors.
    pub fn with_observer(self, observer: Arc<dyn SessionObserver>) -> Self {
        self.shared.inner.lock().observer = observer;
        self
    }

    /// Environment recorded in the metadata of new sessions.
    pub fn with_environment(self, environment: impl Into<String>) -> Self {
        self.shared.inner.lock().environment = environment.into();
        self
    }

    pub fn prompt(&self) -> &str {
        &self.shared.prompt
    }

    pub fn services(&self) -> &Services {
        &self.shared.services
    }

    /// Current snapshot.
    pub fn state(&self) -> BuildState {
        self.shared.updates.borrow().clone()
    }

    pub fn session(&self) -> Option<BuildSession> {
        self.shared.inner.lock().build.session.clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BuildState> {
        self.shared.updates.subscribe()
    }

    /// Whether either timer task is armed.
    pub fn has_running_timers(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner.countdown.is_running() || inner.progress.is_running()
    }

    /// Start a new session and drive it through bootstrap and generation.
    ///
    /// The new session is published before the first suspension point.
    /// Collaborator failures are routed to the error channel and never
    /// returned. Returns the session snapshot once this call has finished
    /// its work, which may still be `building` while the ramp runs.
    pub async fn start_session(&self, source: &dyn StepSource) -> BuildSession {
        let (session, notice) = {
            let mut inner = self.shared.inner.lock();
            inner.stop_timers();
            inner.next_step_id = 0;
            inner.generation_requested = false;
            inner.generation_succeeded = false;
            inner.chat_in_flight = 0;

            let session = BuildSession::new(
                self.shared.prompt.clone(),
                SessionMetadata::new(inner.environment.clone()),
            );
            inner.build = BuildState {
                session: Some(session.clone()),
                loading: true,
                remaining_seconds: self.shared.config.chat_window_secs,
                ..BuildState::default()
            };
            self.shared.publish(&inner);
            (session, Notice::session(&inner))
        };
        notice.deliver();

        info!(session_id = %session.id, prompt = %session.prompt, "Starting build session");

        let bootstrap = self
            .shared
            .services
            .perf
            .measure_async("template_loading", source.bootstrap(&session.prompt))
            .await;

        match bootstrap {
            Ok(batch) => {
                let accepted = {
                    let mut inner = self.shared.inner.lock();
                    if inner.accepts(&session.id) {
                        let steps = if batch.steps.is_empty() {
                            vec![initialize_project_step()]
                        } else {
                            batch.steps
                        };
                        let inner = &mut *inner;
                        if let Some(current) = inner.build.session.as_mut() {
                            current.status = SessionStatus::Building;
                            current
                                .steps
                                .extend(assign_ids(steps, &mut inner.next_step_id));
                            reconcile(current);
                            current.touch();
                            debug!(
                                session_id = %current.id,
                                steps = current.steps.len(),
                                "Bootstrap batch applied"
                            );
                        }
                        inner.generation_requested = batch.generate;
                        self.start_ramp(inner);
                        self.shared.publish(inner);
                        Some(Notice::session(inner))
                    } else {
                        None
                    }
                };

                match accepted {
                    Some(notice) => {
                        notice.deliver();
                        if batch.generate {
                            self.run_generation(source, &session.id, "chat_generation")
                                .await;
                        }
                    }
                    None => warn!(session_id = %session.id, "Discarding bootstrap batch for inactive session"),
                }
            }
            Err(err) => self.route_error(&session.id, err, "startSession", true),
        }

        let snapshot = {
            let mut inner = self.shared.inner.lock();
            if inner.current_id() == Some(session.id.as_str()) {
                inner.build.loading = false;
                self.shared.publish(&inner);
            }
            inner.build.session.clone().unwrap_or(session)
        };

        if snapshot.status == SessionStatus::Building {
            info!(
                session_id = %snapshot.id,
                steps = snapshot.steps.len(),
                "Build session started"
            );
        }
        snapshot
    }

    /// Request another generation batch for the current session.
    pub async fn retry_chat(&self, source: &dyn StepSource) -> SessionResult<()> {
        let session_id = {
            let inner = self.shared.inner.lock();
            let session = inner
                .build
                .session
                .as_ref()
                .ok_or(SessionError::NoActiveSession)?;
            if session.status.is_terminal() {
                return Err(SessionError::InvalidState {
                    status: session.status,
                    operation: "retry chat".to_string(),
                });
            }
            session.id.clone()
        };

        info!(session_id = %session_id, "Retrying chat generation");
        self.run_generation(source, &session_id, "chat_retry").await;
        Ok(())
    }

    /// Cancel the current session. Irreversible; terminal sessions keep their
    /// status but all timers are cleared regardless.
    pub fn cancel_session(&self) -> Option<BuildSession> {
        let (snapshot, notice) = {
            let mut inner = self.shared.inner.lock();
            inner.stop_timers();
            inner.build.chat_loading = false;
            inner.build.is_building = false;
            inner.build.remaining_seconds = 0;

            let session = inner.build.session.as_mut()?;
            if session.is_active() {
                session.status = SessionStatus::Cancelled;
                session.touch();
                info!(session_id = %session.id, "Build session cancelled");
            }
            let snapshot = session.clone();
            self.shared.publish(&inner);
            (snapshot, Notice::session(&inner))
        };
        notice.deliver();
        Some(snapshot)
    }

    /// Stop both timers without changing the session.
    pub fn shutdown(&self) {
        let mut inner = self.shared.inner.lock();
        inner.stop_timers();
        debug!("Session machine timers stopped");
    }

    pub fn update_step(&self, id: StepId, patch: StepPatch) -> bool {
        self.mutate("update_step", true, |session, _| {
            match session.steps.iter_mut().find(|s| s.id == id) {
                Some(step) => {
                    patch.apply(step);
                    true
                }
                None => false,
            }
        })
    }

    /// Append a step; returns `false` when there is no active session.
    pub fn add_step(&self, step: NewStep) -> bool {
        self.mutate("add_step", true, |session, next_id| {
            let id = *next_id;
            *next_id += 1;
            session.steps.push(step.into_step(id));
            true
        })
    }

    pub fn remove_step(&self, id: StepId) -> bool {
        self.mutate("remove_step", true, |session, _| {
            let before = session.steps.len();
            session.steps.retain(|s| s.id != id);
            session.steps.len() != before
        })
    }

    /// Patch a top-level file node.
    pub fn update_file(&self, id: &str, patch: FilePatch) -> bool {
        self.mutate("update_file", false, |session, _| {
            match session.files.iter_mut().find(|f| f.id == id) {
                Some(file) => {
                    patch.apply(file);
                    true
                }
                None => false,
            }
        })
    }

    /// Append a top-level file node with a fresh id.
    pub fn add_file(&self, file: NewFile) -> bool {
        self.mutate("add_file", false, |session, _| {
            let item: FileItem = file.into_item(uuid::Uuid::new_v4().to_string());
            session.files.push(item);
            true
        })
    }

    pub fn remove_file(&self, id: &str) -> bool {
        self.mutate("remove_file", false, |session, _| {
            let before = session.files.len();
            session.files.retain(|f| f.id != id);
            session.files.len() != before
        })
    }

    fn mutate<F>(&self, operation: &str, steps_changed: bool, f: F) -> bool
    where
        F: FnOnce(&mut BuildSession, &mut StepId) -> bool,
    {
        let notice = {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            let Some(session) = inner.build.session.as_mut().filter(|s| s.is_active()) else {
                debug!(operation, "Ignoring mutation without an active session");
                return false;
            };
            if !f(session, &mut inner.next_step_id) {
                debug!(operation, "Ignoring mutation of unknown item");
                return false;
            }
            if steps_changed {
                reconcile(session);
            }
            session.touch();
            self.shared.publish(inner);
            Notice::session(inner)
        };
        notice.deliver();
        true
    }

    async fn run_generation(&self, source: &dyn StepSource, session_id: &str, metric: &str) {
        let prompt = {
            let mut inner = self.shared.inner.lock();
            if !inner.accepts(session_id) {
                return;
            }
            inner.build.chat_loading = true;
            inner.build.chat_timed_out = false;
            inner.build.remaining_seconds = self.shared.config.chat_window_secs;
            inner.chat_in_flight += 1;
            self.start_countdown(&mut inner);
            self.shared.publish(&inner);
            self.shared.prompt.clone()
        };

        let result = self
            .shared
            .services
            .perf
            .measure_async(metric, source.generate(&prompt))
            .await;

        let outcome = {
            let mut inner = self.shared.inner.lock();
            if !inner.accepts(session_id) {
                None
            } else {
                inner.chat_in_flight = inner.chat_in_flight.saturating_sub(1);
                // An overlapping retry still owns the countdown
                if inner.chat_in_flight == 0 {
                    inner.countdown.stop();
                    inner.build.chat_loading = false;
                }

                match result {
                    Ok(steps) => {
                        let inner = &mut *inner;
                        inner.build.chat_timed_out = false;
                        inner.build.error = None;
                        inner.generation_succeeded = true;
                        if let Some(session) = inner.build.session.as_mut() {
                            let count = steps.len();
                            session
                                .steps
                                .extend(assign_ids(steps, &mut inner.next_step_id));
                            reconcile(session);
                            session.touch();
                            info!(session_id = %session.id, added = count, "Generated steps applied");
                        }
                        self.start_ramp(inner);
                        self.shared.publish(inner);
                        Some(Ok(Notice::session(inner)))
                    }
                    Err(err) => {
                        self.shared.publish(&inner);
                        Some(Err(err))
                    }
                }
            }
        };

        match outcome {
            Some(Ok(notice)) => notice.deliver(),
            Some(Err(err)) => self.route_error(session_id, err, metric, false),
            None => warn!(session_id, "Discarding generation result for inactive session"),
        }
    }

    /// Route a collaborator failure: record the message, report it and call
    /// `on_error`. A fatal failure also moves the session to `failed`.
    fn route_error(&self, session_id: &str, err: SessionError, operation: &str, fatal: bool) {
        let notice = {
            let mut inner = self.shared.inner.lock();
            if !inner.accepts(session_id) {
                warn!(session_id, error = %err, "Discarding error for inactive session");
                return;
            }
            inner.build.error = Some(err.to_string());
            if fatal {
                inner.stop_timers();
                inner.build.is_building = false;
                inner.build.chat_loading = false;
                if let Some(session) = inner.build.session.as_mut() {
                    session.status = SessionStatus::Failed;
                    session.touch();
                }
            }
            self.shared.publish(&inner);
            Notice {
                observer: inner.observer.clone(),
                session: if fatal { inner.build.session.clone() } else { None },
                error: None,
            }
        };

        self.shared.services.errors.report(
            err.name(),
            err.to_string(),
            json!({ "operation": operation, "sessionId": session_id }),
            if fatal { Severity::High } else { Severity::Medium },
        );
        Notice {
            error: Some(err),
            ..notice
        }
        .deliver();
    }

    fn start_countdown(&self, inner: &mut Inner) {
        let epoch = inner.countdown.rearm();
        let tick = self.shared.config.countdown_tick();
        let weak = Arc::downgrade(&self.shared);

        inner.countdown.handle = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                if !countdown_tick(&weak, epoch) {
                    break;
                }
            }
        }));
    }

    fn start_ramp(&self, inner: &mut Inner) {
        let epoch = inner.progress.rearm();
        let step_count = inner.build.session.as_ref().map_or(0, |s| s.steps.len());
        inner.ramp = progress::ramp(step_count);
        inner.ramp_cursor = 0;
        inner.build.is_building = true;
        inner.build.build_progress = 0;

        let tick = self.shared.config.progress_tick();
        let weak = Arc::downgrade(&self.shared);

        inner.progress.handle = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                if !progress_tick(&weak, epoch) {
                    break;
                }
            }
        }));
    }
}

/// One countdown tick. Returns `false` once the timer is done.
fn countdown_tick(weak: &Weak<Shared>, epoch: u64) -> bool {
    let Some(shared) = weak.upgrade() else {
        return false;
    };
    let mut inner = shared.inner.lock();
    if inner.countdown.epoch != epoch {
        return false;
    }

    if inner.build.remaining_seconds <= 1 {
        inner.build.remaining_seconds = 0;
        inner.build.chat_timed_out = true;
        inner.build.chat_loading = false;
        inner.countdown.handle = None;
        warn!(
            session_id = inner.current_id().unwrap_or_default(),
            "Chat generation exceeded the response window"
        );
        shared.publish(&inner);
        return false;
    }

    inner.build.remaining_seconds -= 1;
    shared.publish(&inner);
    true
}

/// One ramp tick. Returns `false` once the ramp has finished.
fn progress_tick(weak: &Weak<Shared>, epoch: u64) -> bool {
    let Some(shared) = weak.upgrade() else {
        return false;
    };

    let notice = {
        let mut guard = shared.inner.lock();
        let inner = &mut *guard;
        if inner.progress.epoch != epoch {
            return false;
        }

        if let Some(&value) = inner.ramp.get(inner.ramp_cursor) {
            inner.build.build_progress = value;
            inner.ramp_cursor += 1;
            shared.publish(inner);
            return true;
        }

        inner.build.is_building = false;
        inner.progress.handle = None;
        let completed = try_complete(inner);
        shared.publish(inner);
        completed.then(|| Notice::session(inner))
    };

    if let Some(notice) = notice {
        notice.deliver();
    }
    false
}

/// Move the session to `completed` once the ramp is done and generation has
/// settled successfully (or was never requested).
fn try_complete(inner: &mut Inner) -> bool {
    if inner.build.is_building || inner.chat_in_flight > 0 {
        return false;
    }
    if inner.generation_requested && !inner.generation_succeeded {
        return false;
    }
    let Some(session) = inner.build.session.as_mut() else {
        return false;
    };
    if session.status != SessionStatus::Building {
        return false;
    }

    session.status = SessionStatus::Completed;
    session.touch();
    inner.countdown.stop();
    info!(
        session_id = %session.id,
        steps = session.steps.len(),
        files = session.files.len(),
        "Build session completed"
    );
    true
}

/// Fold pending file steps into the tree.
fn reconcile(session: &mut BuildSession) {
    if let Some(outcome) = apply_pending_steps(&session.steps, &session.files) {
        debug!(session_id = %session.id, applied = outcome.applied, "Merged pending steps");
        session.steps = outcome.steps;
        session.files = outcome.files;
    }
}

/// Give each step a session-unique id.
fn assign_ids(steps: Vec<BuildStep>, next_id: &mut StepId) -> Vec<BuildStep> {
    steps
        .into_iter()
        .map(|mut step| {
            step.id = *next_id;
            *next_id += 1;
            step
        })
        .collect()
}

fn initialize_project_step() -> BuildStep {
    BuildStep::new(
        0,
        StepType::CreateFolder,
        "Initialize Project",
        "Setting up project structure",
    )
    .with_path("/")
}
