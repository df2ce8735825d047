//! Process-wide interception state snapshot.

use crate::models::paused::{PausedRequest, TabId};
use crate::models::rule::InterceptRule;
use serde::{Deserialize, Serialize};

/// Everything the UI needs to render: the global flag, rules, tabs and
/// requests currently held
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionState {
    pub enabled: bool,
    /// Insertion order is match priority
    pub rules: Vec<InterceptRule>,
    pub attached_tabs: Vec<TabId>,
    pub paused_requests: Vec<PausedRequest>,
}

impl ExtensionState {
    pub fn paused_request(&self, request_id: &str) -> Option<&PausedRequest> {
        self.paused_requests
            .iter()
            .find(|r| r.request_id == request_id)
    }

    pub fn is_attached(&self, tab_id: TabId) -> bool {
        self.attached_tabs.contains(&tab_id)
    }
}

/// Shallow merge input for [`crate::state::StateStore::set`]
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub enabled: Option<bool>,
    pub rules: Option<Vec<InterceptRule>>,
    pub attached_tabs: Option<Vec<TabId>>,
    pub paused_requests: Option<Vec<PausedRequest>>,
}

impl StatePatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn rules(rules: Vec<InterceptRule>) -> Self {
        Self {
            rules: Some(rules),
            ..Default::default()
        }
    }
}
