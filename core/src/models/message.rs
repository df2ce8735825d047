//! Messages exchanged between UI surfaces and the interception core.

use crate::models::paused::{PausedRequest, PausedRequestResolution, TabId};
use crate::models::rule::InterceptRule;
use crate::models::state::ExtensionState;
use serde::{Deserialize, Serialize};

/// Requests sent by the popup or panel; each is answered with a state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiMessage {
    GetState,
    SetEnabled {
        enabled: bool,
    },
    AddRule {
        rule: InterceptRule,
    },
    UpdateRule {
        rule: InterceptRule,
    },
    #[serde(rename_all = "camelCase")]
    DeleteRule {
        rule_id: String,
    },
    #[serde(rename_all = "camelCase")]
    AttachTab {
        tab_id: TabId,
    },
    #[serde(rename_all = "camelCase")]
    DetachTab {
        tab_id: TabId,
    },
    #[serde(rename_all = "camelCase")]
    ResolveRequest {
        request_id: String,
        tab_id: TabId,
        resolution: PausedRequestResolution,
    },
}

impl UiMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            UiMessage::GetState => "GET_STATE",
            UiMessage::SetEnabled { .. } => "SET_ENABLED",
            UiMessage::AddRule { .. } => "ADD_RULE",
            UiMessage::UpdateRule { .. } => "UPDATE_RULE",
            UiMessage::DeleteRule { .. } => "DELETE_RULE",
            UiMessage::AttachTab { .. } => "ATTACH_TAB",
            UiMessage::DetachTab { .. } => "DETACH_TAB",
            UiMessage::ResolveRequest { .. } => "RESOLVE_REQUEST",
        }
    }
}

/// Fire-and-forget notifications pushed to every UI surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundMessage {
    StateUpdated {
        state: ExtensionState,
    },
    RequestPaused {
        request: PausedRequest,
    },
    #[serde(rename_all = "camelCase")]
    RequestResolved {
        request_id: String,
    },
}
