//! Interception state store
//!
//! Single owner of [`ExtensionState`]. Every mutation goes through one of the
//! methods below, each of which holds the lock for the whole change and never
//! across an `.await`, so callers observe either the old or the new state.
//!
//! The store starts with defaults (disabled, empty) and is loaded once from
//! durable settings by [`StateStore::init`]. Handlers that mutate state must
//! call [`StateStore::ready`] first so an early edit is not overwritten by the
//! load.

use crate::models::{ExtensionState, InterceptRule, PausedRequest, StatePatch, TabId};
use crate::storage::SettingsStore;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

pub struct StateStore {
    state: RwLock<ExtensionState>,
    ready: watch::Sender<bool>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            state: RwLock::new(ExtensionState::default()),
            ready,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ExtensionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ExtensionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load rules and the enabled flag, then open the ready gate.
    ///
    /// A storage failure leaves the defaults in place; the gate opens either way.
    pub async fn init(&self, settings: &dyn SettingsStore) {
        let (rules, enabled) = tokio::join!(settings.load_rules(), settings.load_enabled());
        match (rules, enabled) {
            (Ok(rules), Ok(enabled)) => {
                tracing::info!(
                    "Loaded {} rule(s) from storage, interception {}",
                    rules.len(),
                    if enabled { "enabled" } else { "disabled" }
                );
                self.set(StatePatch {
                    enabled: Some(enabled),
                    rules: Some(rules),
                    ..Default::default()
                });
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to load settings, using defaults: {:#}", e);
            }
        }
        self.mark_ready();
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once the initial load has finished
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Snapshot of the current state
    pub fn get(&self) -> ExtensionState {
        self.read().clone()
    }

    /// Run `f` against the live state without cloning it
    pub fn with_state<R>(&self, f: impl FnOnce(&ExtensionState) -> R) -> R {
        f(&self.read())
    }

    /// Shallow merge: fields set in `patch` replace the current ones
    pub fn set(&self, patch: StatePatch) {
        let mut state = self.write();
        if let Some(enabled) = patch.enabled {
            state.enabled = enabled;
        }
        if let Some(rules) = patch.rules {
            state.rules = rules;
        }
        if let Some(tabs) = patch.attached_tabs {
            state.attached_tabs = tabs;
        }
        if let Some(paused) = patch.paused_requests {
            state.paused_requests = paused;
        }
    }

    pub fn enabled(&self) -> bool {
        self.read().enabled
    }

    pub fn rules(&self) -> Vec<InterceptRule> {
        self.read().rules.clone()
    }

    pub fn attached_tabs(&self) -> Vec<TabId> {
        self.read().attached_tabs.clone()
    }

    pub fn is_attached(&self, tab_id: TabId) -> bool {
        self.read().is_attached(tab_id)
    }

    pub fn paused_request(&self, request_id: &str) -> Option<PausedRequest> {
        self.read().paused_request(request_id).cloned()
    }

    /// Track a paused request; a second entry with the same id replaces the first
    pub fn add_paused_request(&self, request: PausedRequest) {
        upsert_paused(&mut self.write(), request);
    }

    /// Track a paused request only if its tab is still attached, checked under
    /// the same lock as the insert. Returns false when the tab is gone.
    pub fn track_paused_request(&self, request: PausedRequest) -> bool {
        let mut state = self.write();
        if !state.is_attached(request.tab_id) {
            return false;
        }
        upsert_paused(&mut state, request);
        true
    }

    /// Remove a paused request; removing an unknown id is a no-op
    pub fn remove_paused_request(&self, request_id: &str) -> Option<PausedRequest> {
        let mut state = self.write();
        let index = state
            .paused_requests
            .iter()
            .position(|r| r.request_id == request_id)?;
        Some(state.paused_requests.remove(index))
    }

    /// Returns false when the tab was already attached
    pub fn add_attached_tab(&self, tab_id: TabId) -> bool {
        let mut state = self.write();
        if state.attached_tabs.contains(&tab_id) {
            return false;
        }
        state.attached_tabs.push(tab_id);
        true
    }

    /// Forget a tab along with every request it still has paused.
    ///
    /// Returns the purged requests.
    pub fn remove_attached_tab(&self, tab_id: TabId) -> Vec<PausedRequest> {
        let mut state = self.write();
        state.attached_tabs.retain(|id| *id != tab_id);
        let (purged, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.paused_requests)
            .into_iter()
            .partition(|r| r.tab_id == tab_id);
        state.paused_requests = kept;
        purged
    }

    /// Append a rule at lowest priority. A rule whose id is already present
    /// replaces that entry in place instead.
    pub fn add_rule(&self, rule: InterceptRule) {
        let mut state = self.write();
        if let Some(existing) = state.rules.iter_mut().find(|r| r.id == rule.id) {
            tracing::warn!("Rule {} already exists, replacing it", rule.id);
            *existing = rule;
        } else {
            state.rules.push(rule);
        }
    }

    /// Replace the rule with the same id, keeping its position
    pub fn update_rule(&self, rule: InterceptRule) -> bool {
        let mut state = self.write();
        match state.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                *existing = rule;
                true
            }
            None => false,
        }
    }

    pub fn delete_rule(&self, rule_id: &str) -> bool {
        let mut state = self.write();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != rule_id);
        before != state.rules.len()
    }
}

fn upsert_paused(state: &mut ExtensionState, request: PausedRequest) {
    if let Some(existing) = state
        .paused_requests
        .iter_mut()
        .find(|r| r.request_id == request.request_id)
    {
        tracing::warn!(
            "Paused request {} already tracked, replacing it",
            request.request_id
        );
        *existing = request;
    } else {
        state.paused_requests.push(request);
    }
}
