//! # forge_client
//!
//! Clients for the SiteForge template and chat endpoints.
//!
//! - [`BuildBackend`]: the async seam the orchestrator talks to
//! - [`HttpBackend`]: reqwest implementation with a session cookie store
//! - [`MockBackend`]: scripted backend for tests

pub mod backend;
pub mod error;
pub mod http;
pub mod mock;
pub mod types;

pub use backend::BuildBackend;
pub use error::{ClientError, ClientResult};
pub use http::HttpBackend;
pub use mock::{CapturedCall, Endpoint, MockBackend};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatText, MessageRole, TemplateRequest,
    TemplateResponse,
};
