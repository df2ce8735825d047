//! Request/response channel for UI surfaces
//!
//! Every message is answered with the resulting state snapshot. Mutations
//! wait for the initial settings load, persist the changed setting, and
//! broadcast `STATE_UPDATED`.

use crate::intercept::{EventBroadcaster, InterceptionEngine, SessionManager};
use crate::models::{ExtensionState, UiMessage};
use crate::state::StateStore;
use crate::storage::SettingsStore;
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;

pub struct MessageHandler {
    extension_id: String,
    state: Arc<StateStore>,
    settings: Arc<dyn SettingsStore>,
    sessions: Arc<SessionManager>,
    engine: Arc<InterceptionEngine>,
    events: EventBroadcaster,
}

impl MessageHandler {
    pub fn new(
        extension_id: impl Into<String>,
        state: Arc<StateStore>,
        settings: Arc<dyn SettingsStore>,
        sessions: Arc<SessionManager>,
        engine: Arc<InterceptionEngine>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            extension_id: extension_id.into(),
            state,
            settings,
            sessions,
            engine,
            events,
        }
    }

    /// Channel boundary: accepts raw JSON from `sender_id` and always answers
    /// with a snapshot. Foreign senders, unknown message types and failed
    /// operations get the current state back.
    pub async fn handle_raw(&self, sender_id: Option<&str>, message: Value) -> ExtensionState {
        if sender_id != Some(self.extension_id.as_str()) {
            tracing::debug!("Ignoring message from foreign sender {:?}", sender_id);
            return self.state.get();
        }

        let message = match serde_json::from_value::<UiMessage>(message) {
            Ok(message) => message,
            Err(err) => {
                // Includes our own broadcasts echoed back to us
                tracing::debug!("Ignoring unrecognized message: {}", err);
                return self.state.get();
            }
        };

        let kind = message.kind();
        match self.handle(message).await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!("{} failed: {:#}", kind, err);
                self.state.get()
            }
        }
    }

    pub async fn handle(&self, message: UiMessage) -> anyhow::Result<ExtensionState> {
        self.state.ready().await;
        tracing::debug!("Handling {}", message.kind());

        match message {
            UiMessage::GetState => {}
            UiMessage::SetEnabled { enabled } => {
                self.state.set(crate::models::StatePatch::enabled(enabled));
                self.settings
                    .save_enabled(enabled)
                    .await
                    .context("saving enabled flag")?;
                tracing::info!(
                    "Interception {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                self.events.state_updated(self.state.get());
            }
            UiMessage::AddRule { rule } => {
                self.state.add_rule(rule);
                self.rules_changed().await?;
            }
            UiMessage::UpdateRule { rule } => {
                if !self.state.update_rule(rule.clone()) {
                    tracing::warn!("Update for unknown rule {} ignored", rule.id);
                }
                self.rules_changed().await?;
            }
            UiMessage::DeleteRule { rule_id } => {
                self.state.delete_rule(&rule_id);
                self.rules_changed().await?;
            }
            UiMessage::AttachTab { tab_id } => {
                self.sessions
                    .attach(tab_id)
                    .await
                    .with_context(|| format!("attaching to tab {}", tab_id))?;
                self.events.state_updated(self.state.get());
            }
            UiMessage::DetachTab { tab_id } => {
                self.sessions.detach(tab_id).await;
                self.events.state_updated(self.state.get());
            }
            UiMessage::ResolveRequest {
                request_id,
                tab_id,
                resolution,
            } => {
                self.engine
                    .resolve_request(&request_id, tab_id, &resolution)
                    .await?;
            }
        }

        Ok(self.state.get())
    }

    async fn rules_changed(&self) -> anyhow::Result<()> {
        let rules = self.state.rules();
        self.settings
            .save_rules(&rules)
            .await
            .context("saving rules")?;
        self.sessions.resync_all().await;
        self.engine.prune_pattern_cache();
        self.events.state_updated(self.state.get());
        Ok(())
    }
}
