//! # forge_session
//!
//! Build session lifecycle for SiteForge.
//!
//! A [`BuildSessionMachine`] owns one session at a time. It pulls steps from a
//! [`StepSource`], folds them into the virtual file tree, runs the chat
//! countdown and the cosmetic progress ramp, and publishes [`BuildState`]
//! snapshots on a watch channel.
//!
//! The [`Orchestrator`] wires a machine to a template/chat backend.

pub mod config;
pub mod error;
pub mod machine;
pub mod observer;
pub mod orchestrator;
pub mod progress;
pub mod services;
pub mod source;

pub use config::{ApiConfig, FeatureFlags, ForgeConfig, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use machine::{BuildSessionMachine, BuildState};
pub use observer::{NoopObserver, SessionObserver};
pub use orchestrator::{Orchestrator, TemplateChatSource};
pub use progress::{ramp, ramp_value, MIN_RAMP_SLOTS};
pub use services::{
    ErrorReport, ErrorReporter, Metric, MetricSummary, PerformanceMonitor, Services, Severity,
};
pub use source::{BootstrapBatch, StepSource};
