//! Paused requests and the user decisions that release them.

use crate::models::rule::{HeaderEntry, RequestStage};
use serde::{Deserialize, Serialize};

/// Browser tab identifier as assigned by the host
pub type TabId = i32;

/// A request suspended by a pause rule, awaiting a user decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedRequest {
    pub request_id: String,
    pub tab_id: TabId,
    pub rule_id: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    pub resource_type: String,
    pub stage: RequestStage,
    // Response-phase fields, only set when stage is Response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: i64,
}

/// Edits applied to a paused response before it reaches the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseModifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ResponseModifications {
    /// An empty body counts as no edit, matching how the panel submits forms
    pub fn is_empty(&self) -> bool {
        self.body.as_deref().map_or(true, str::is_empty)
            && self.response_code.map_or(true, |code| code == 0)
            && self.response_headers.is_none()
    }
}

/// One-shot user decision for a paused request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PausedRequestResolution {
    Continue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modifications: Option<crate::models::rule::RequestModifications>,
    },
    ContinueResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modifications: Option<ResponseModifications>,
    },
    #[serde(rename_all = "camelCase")]
    Fulfill {
        response_code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_headers: Option<Vec<HeaderEntry>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Fail {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Error reason sent when a fail resolution carries none
pub const DEFAULT_FAIL_REASON: &str = "Failed";
