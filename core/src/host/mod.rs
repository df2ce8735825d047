//! Debugging protocol host boundary
//!
//! The interception core never talks to a browser directly. A host owns the
//! attached debugging sessions and delivers protocol events; the core issues
//! `Fetch.*` commands through the [`DebuggerHost`] trait and receives events
//! as [`HostEvent`] values on a channel.

pub mod protocol;
pub mod recording;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use crate::models::TabId;

/// Protocol version requested when attaching to a tab
pub const PROTOCOL_VERSION: &str = "1.3";

/// Failures reported by the host
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("no debugging session is attached to tab {0}")]
    NotAttached(TabId),
    #[error("tab {0} was closed")]
    TabClosed(TabId),
    #[error("{method} failed: {message}")]
    Command { method: String, message: String },
    #[error("malformed {method} result: {message}")]
    MalformedResponse { method: String, message: String },
}

impl HostError {
    pub fn command(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// Debugging session provider for browser tabs.
#[async_trait]
pub trait DebuggerHost: Send + Sync {
    async fn attach(&self, tab_id: TabId, protocol_version: &str) -> Result<(), HostError>;

    async fn detach(&self, tab_id: TabId) -> Result<(), HostError>;

    async fn send_command(
        &self,
        tab_id: TabId,
        method: &str,
        params: Value,
    ) -> Result<Value, HostError>;
}

/// Events pushed by the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A protocol event raised by a tab's session
    Protocol {
        tab_id: TabId,
        method: String,
        params: Value,
    },
    /// The session ended without us asking (devtools opened, user cancelled)
    Detached { tab_id: Option<TabId> },
    TabRemoved { tab_id: TabId },
}

impl HostEvent {
    pub fn request_paused(tab_id: TabId, params: Value) -> Self {
        Self::Protocol {
            tab_id,
            method: protocol::REQUEST_PAUSED.to_string(),
            params,
        }
    }
}
