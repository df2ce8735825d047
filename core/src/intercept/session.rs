//! Tab session lifecycle
//!
//! Keeps each attached tab's `Fetch.enable` pattern list equal to the
//! patterns derived from the current rules. Host failures here are expected
//! churn (tabs close at any moment) and are logged rather than surfaced,
//! except on attach where the caller asked for the session explicitly.

use crate::host::protocol::{self, FetchCommand, RequestPattern};
use crate::host::{DebuggerHost, HostError, PROTOCOL_VERSION};
use crate::models::{InterceptRule, PausedRequest, TabId};
use crate::state::StateStore;
use std::sync::Arc;

/// Enabled rules as `Fetch.enable` patterns, in rule order, globs verbatim
pub fn build_fetch_patterns(rules: &[InterceptRule]) -> Vec<RequestPattern> {
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .map(|rule| RequestPattern {
            url_pattern: rule.url_pattern.clone(),
            request_stage: rule.request_stage,
        })
        .collect()
}

/// An empty list would intercept nothing, so fall back to catching everything
fn patterns_or_catch_all(rules: &[InterceptRule]) -> Vec<RequestPattern> {
    let patterns = build_fetch_patterns(rules);
    if patterns.is_empty() {
        vec![RequestPattern::catch_all()]
    } else {
        patterns
    }
}

pub struct SessionManager {
    host: Arc<dyn DebuggerHost>,
    state: Arc<StateStore>,
    protocol_version: String,
}

impl SessionManager {
    pub fn new(host: Arc<dyn DebuggerHost>, state: Arc<StateStore>) -> Self {
        Self {
            host,
            state,
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Open a session on the tab, register it, and start intercepting
    pub async fn attach(&self, tab_id: TabId) -> Result<(), HostError> {
        self.host.attach(tab_id, &self.protocol_version).await?;
        self.state.add_attached_tab(tab_id);

        let patterns = patterns_or_catch_all(&self.state.rules());
        tracing::info!(
            "Attached to tab {} with {} pattern(s)",
            tab_id,
            patterns.len()
        );
        protocol::dispatch(self.host.as_ref(), tab_id, FetchCommand::Enable { patterns }).await?;
        Ok(())
    }

    /// End the session if one exists and forget the tab.
    ///
    /// Returns the paused requests dropped with it; the host's own teardown
    /// releases them.
    pub async fn detach(&self, tab_id: TabId) -> Vec<PausedRequest> {
        if let Err(err) = self.host.detach(tab_id).await {
            // Already gone (tab closed, devtools took over); nothing to end
            tracing::warn!("Detach from tab {}: session already ended ({})", tab_id, err);
        }
        let purged = self.state.remove_attached_tab(tab_id);
        tracing::info!(
            "Detached from tab {} ({} paused request(s) dropped)",
            tab_id,
            purged.len()
        );
        purged
    }

    /// Re-register the current patterns on one tab. Returns false when the
    /// tab could not be updated, which only happens when it went away.
    pub async fn resync(&self, tab_id: TabId) -> bool {
        let patterns = patterns_or_catch_all(&self.state.rules());
        let host = self.host.as_ref();
        let result = async {
            protocol::dispatch(host, tab_id, FetchCommand::Disable).await?;
            protocol::dispatch(host, tab_id, FetchCommand::Enable { patterns }).await
        }
        .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("Pattern resync for tab {} skipped, tab may be closed: {}", tab_id, err);
                false
            }
        }
    }

    /// Resync every attached tab concurrently; one tab failing does not
    /// affect the others
    pub async fn resync_all(&self) {
        let tabs = self.state.attached_tabs();
        if tabs.is_empty() {
            return;
        }
        let results = futures::future::join_all(tabs.iter().map(|tab| self.resync(*tab))).await;
        let failed = results.iter().filter(|ok| !**ok).count();
        tracing::debug!("Resynced {} tab(s), {} skipped", tabs.len(), failed);
    }

    /// The host ended a session on its own. Returns true if state changed.
    pub fn handle_host_detached(&self, tab_id: Option<TabId>) -> bool {
        let Some(tab_id) = tab_id else {
            return false;
        };
        let was_attached = self.state.is_attached(tab_id);
        self.state.remove_attached_tab(tab_id);
        if was_attached {
            tracing::info!("Session on tab {} ended externally", tab_id);
        }
        was_attached
    }

    /// A tab closed. Returns true if it was attached.
    pub fn handle_tab_removed(&self, tab_id: TabId) -> bool {
        if !self.state.is_attached(tab_id) {
            return false;
        }
        self.state.remove_attached_tab(tab_id);
        tracing::info!("Attached tab {} was closed", tab_id);
        true
    }
}
