//! Paused request state machine
//!
//! Every `Fetch.requestPaused` event ends in exactly one of:
//! - released untouched (no rule, interception off, or any failure),
//! - released with the matched rule's edits (modify, mock, proxy),
//! - held as a [`PausedRequest`] until [`InterceptionEngine::resolve_request`].
//!
//! Unmatched or failing traffic is always released; a broken rule must not
//! stall the page.

use crate::host::protocol::{
    self, salvage_release_target, ContinueRequest, FetchCommand, FulfillRequest,
    RequestPausedEvent, ResponseBody,
};
use crate::host::{DebuggerHost, HostError};
use crate::intercept::encoding::{self, encode_non_empty};
use crate::intercept::events::EventBroadcaster;
use crate::intercept::matcher::find_matching_rule;
use crate::intercept::pattern::PatternCache;
use crate::intercept::InterceptError;
use crate::models::{
    InterceptRule, PausedRequest, PausedRequestResolution, RequestStage, RuleAction, TabId,
    DEFAULT_FAIL_REASON,
};
use crate::state::StateStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct InterceptionEngine {
    host: Arc<dyn DebuggerHost>,
    state: Arc<StateStore>,
    events: EventBroadcaster,
    patterns: PatternCache,
    /// Request ids with a resolution command in flight
    resolving: Mutex<HashSet<String>>,
}

impl InterceptionEngine {
    pub fn new(host: Arc<dyn DebuggerHost>, state: Arc<StateStore>, events: EventBroadcaster) -> Self {
        Self {
            host,
            state,
            events,
            patterns: PatternCache::new(),
            resolving: Mutex::new(HashSet::new()),
        }
    }

    /// Entry point for raw `Fetch.requestPaused` params. Never fails: any
    /// error releases the request unmodified and is logged.
    pub async fn on_request_paused(&self, tab_id: TabId, params: Value) {
        let event = match serde_json::from_value::<RequestPausedEvent>(params.clone()) {
            Ok(event) => event,
            Err(err) => {
                let err = InterceptError::MalformedEvent(err);
                tracing::error!("Tab {}: {}", tab_id, err);
                if let Some((request_id, stage)) = salvage_release_target(&params) {
                    self.release_after_failure(tab_id, request_id, stage).await;
                }
                return;
            }
        };

        if let Err(err) = self.handle_request_paused(tab_id, &event).await {
            tracing::error!(
                "Handling paused request {} on tab {} failed: {}",
                event.request_id,
                tab_id,
                err
            );
            self.release_after_failure(tab_id, event.request_id.clone(), event.stage())
                .await;
        }
    }

    async fn release_after_failure(&self, tab_id: TabId, request_id: String, stage: RequestStage) {
        let command = FetchCommand::release(request_id.clone(), stage);
        if let Err(err) = self.send(tab_id, command).await {
            tracing::warn!(
                "Fallback release of {} on tab {} also failed: {}",
                request_id,
                tab_id,
                err
            );
        }
    }

    /// Match the event against the rules and carry out the outcome
    pub async fn handle_request_paused(
        &self,
        tab_id: TabId,
        event: &RequestPausedEvent,
    ) -> Result<(), InterceptError> {
        let stage = event.stage();
        let rule = self.state.with_state(|state| {
            find_matching_rule(&self.patterns, state.enabled, &state.rules, event, stage).cloned()
        });

        let Some(rule) = rule else {
            self.send(tab_id, FetchCommand::release(event.request_id.clone(), stage))
                .await?;
            return Ok(());
        };

        tracing::debug!(
            "Rule {} ({}) matched {} {} on tab {}",
            rule.id,
            rule.action.kind(),
            event.request.method,
            event.request.url,
            tab_id
        );

        match &rule.action {
            RuleAction::Pause => self.pause(tab_id, event, &rule, stage).await,
            RuleAction::ModifyRequest { modifications } => {
                let command = FetchCommand::ContinueRequest(ContinueRequest {
                    request_id: event.request_id.clone(),
                    url: modifications.url.clone(),
                    method: modifications.method.clone(),
                    headers: modifications.headers.clone(),
                    post_data: encode_non_empty(modifications.post_data.as_deref()),
                });
                self.send(tab_id, command).await?;
                Ok(())
            }
            RuleAction::MockResponse { response } => {
                let command = FetchCommand::FulfillRequest(FulfillRequest {
                    request_id: event.request_id.clone(),
                    response_code: response.response_code,
                    response_headers: response.response_headers.clone(),
                    body: encode_non_empty(response.body.as_deref()),
                });
                self.send(tab_id, command).await?;
                Ok(())
            }
            RuleAction::Proxy { target_url } => {
                let command = FetchCommand::ContinueRequest(ContinueRequest {
                    request_id: event.request_id.clone(),
                    url: Some(target_url.clone()),
                    ..Default::default()
                });
                self.send(tab_id, command).await?;
                Ok(())
            }
        }
    }

    async fn pause(
        &self,
        tab_id: TabId,
        event: &RequestPausedEvent,
        rule: &InterceptRule,
        stage: RequestStage,
    ) -> Result<(), InterceptError> {
        let is_response = stage == RequestStage::Response;
        let response_body = if is_response {
            self.fetch_response_body(tab_id, &event.request_id).await
        } else {
            None
        };

        let paused = PausedRequest {
            request_id: event.request_id.clone(),
            tab_id,
            rule_id: rule.id.clone(),
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            headers: event.headers(),
            post_data: event.request.post_data.clone(),
            resource_type: event.resource_type.clone(),
            stage,
            response_status_code: event.response_status_code.filter(|_| is_response),
            response_headers: event.response_headers.clone().filter(|_| is_response),
            response_body,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        if !self.state.track_paused_request(paused.clone()) {
            // Tab detached while the body was being read; its session teardown
            // releases the request
            tracing::debug!(
                "Tab {} detached before {} could be paused",
                tab_id,
                paused.request_id
            );
            return Ok(());
        }

        tracing::info!(
            "Paused {} {} on tab {} (rule {})",
            paused.method,
            paused.url,
            tab_id,
            rule.id
        );
        self.events.request_paused(paused);
        self.events.state_updated(self.state.get());
        Ok(())
    }

    /// Response body for a paused response, or `None` if it cannot be read
    async fn fetch_response_body(&self, tab_id: TabId, request_id: &str) -> Option<String> {
        let command = FetchCommand::GetResponseBody {
            request_id: request_id.to_string(),
        };
        let body = match self.send(tab_id, command).await.and_then(ResponseBody::from_result) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("Could not read response body of {}: {}", request_id, err);
                return None;
            }
        };

        if !body.base64_encoded {
            return Some(body.body);
        }
        match encoding::decode(&body.body) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!("Response body of {} is not valid base64: {}", request_id, err);
                None
            }
        }
    }

    /// Apply a user decision to a paused request.
    ///
    /// The request leaves the paused set and `REQUEST_RESOLVED` +
    /// `STATE_UPDATED` go out whether or not the command succeeded, and also
    /// when this future is dropped mid-command; a command failure is returned
    /// afterwards.
    pub async fn resolve_request(
        &self,
        request_id: &str,
        tab_id: TabId,
        resolution: &PausedRequestResolution,
    ) -> Result<(), InterceptError> {
        let claim = self.claim(request_id, tab_id)?;

        let command = resolution_command(request_id, resolution);
        let result = self.send(tab_id, command).await;
        drop(claim);

        match result {
            Ok(_) => {
                tracing::info!("Resolved {} on tab {}", request_id, tab_id);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Resolving {} on tab {} failed: {}", request_id, tab_id, err);
                Err(err.into())
            }
        }
    }

    fn resolving_set(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.resolving.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve a paused request for resolution so it is released once only
    fn claim(&self, request_id: &str, tab_id: TabId) -> Result<ResolutionClaim<'_>, InterceptError> {
        let is_paused_here = self
            .state
            .paused_request(request_id)
            .map_or(false, |r| r.tab_id == tab_id);
        if !is_paused_here {
            return Err(InterceptError::NotPaused {
                request_id: request_id.to_string(),
                tab_id,
            });
        }
        if !self.resolving_set().insert(request_id.to_string()) {
            return Err(InterceptError::AlreadyResolving(request_id.to_string()));
        }
        Ok(ResolutionClaim {
            engine: self,
            request_id: request_id.to_string(),
        })
    }

    /// Drop cached patterns that no current rule uses
    pub fn prune_pattern_cache(&self) {
        let rules = self.state.rules();
        self.patterns
            .retain_patterns(rules.iter().map(|r| r.url_pattern.as_str()));
    }

    async fn send(&self, tab_id: TabId, command: FetchCommand) -> Result<Value, HostError> {
        protocol::dispatch(self.host.as_ref(), tab_id, command).await
    }
}

/// Exclusive right to resolve one paused request. Dropping it retires the
/// request: removed from state, released from the in-flight set, broadcast.
struct ResolutionClaim<'a> {
    engine: &'a InterceptionEngine,
    request_id: String,
}

impl Drop for ResolutionClaim<'_> {
    fn drop(&mut self) {
        let engine = self.engine;
        engine.state.remove_paused_request(&self.request_id);
        engine.resolving_set().remove(&self.request_id);
        engine.events.request_resolved(self.request_id.clone());
        engine.events.state_updated(engine.state.get());
    }
}

/// The command that carries out `resolution`
pub fn resolution_command(request_id: &str, resolution: &PausedRequestResolution) -> FetchCommand {
    let request_id = request_id.to_string();
    match resolution {
        PausedRequestResolution::Continue { modifications } => {
            let mods = modifications.clone().unwrap_or_default();
            FetchCommand::ContinueRequest(ContinueRequest {
                request_id,
                url: mods.url,
                method: mods.method,
                headers: mods.headers,
                post_data: encode_non_empty(mods.post_data.as_deref()),
            })
        }
        PausedRequestResolution::ContinueResponse { modifications } => match modifications {
            Some(mods) if !mods.is_empty() => FetchCommand::FulfillRequest(FulfillRequest {
                request_id,
                response_code: mods.response_code.filter(|code| *code != 0).unwrap_or(200),
                response_headers: mods.response_headers.clone(),
                body: encode_non_empty(mods.body.as_deref()),
            }),
            _ => FetchCommand::ContinueResponse { request_id },
        },
        PausedRequestResolution::Fulfill {
            response_code,
            response_headers,
            body,
        } => FetchCommand::FulfillRequest(FulfillRequest {
            request_id,
            response_code: *response_code,
            response_headers: response_headers.clone(),
            body: encode_non_empty(body.as_deref()),
        }),
        PausedRequestResolution::Fail { reason } => FetchCommand::FailRequest {
            request_id,
            error_reason: reason
                .clone()
                .unwrap_or_else(|| DEFAULT_FAIL_REASON.to_string()),
        },
    }
}
