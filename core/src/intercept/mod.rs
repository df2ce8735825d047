//! Interception core
//!
//! Pattern compilation, rule matching, tab session management and the paused
//! request state machine.

pub mod encoding;
pub mod engine;
pub mod events;
pub mod matcher;
pub mod pattern;
pub mod session;

pub use engine::InterceptionEngine;
pub use events::EventBroadcaster;
pub use session::{build_fetch_patterns, SessionManager};

use crate::host::HostError;
use crate::models::TabId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("request {request_id} is not paused on tab {tab_id}")]
    NotPaused { request_id: String, tab_id: TabId },
    #[error("request {0} is already being resolved")]
    AlreadyResolving(String),
    #[error("malformed Fetch.requestPaused payload: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}
