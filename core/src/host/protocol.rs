//! `Fetch` domain vocabulary
//!
//! Typed commands and events for the narrow slice of the debugging protocol
//! the interceptor speaks. Optional parameters are omitted from the wire
//! payload when unset; the host treats an omitted field as "leave unchanged".

use crate::host::{DebuggerHost, HostError, TabId};
use crate::models::{HeaderEntry, RequestStage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const REQUEST_PAUSED: &str = "Fetch.requestPaused";

/// Pattern registered with `Fetch.enable`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    pub url_pattern: String,
    pub request_stage: RequestStage,
}

impl RequestPattern {
    /// Intercepts every request at the request stage
    pub fn catch_all() -> Self {
        Self {
            url_pattern: "*".to_string(),
            request_stage: RequestStage::Request,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueRequest {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderEntry>>,
    /// Base64 payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillRequest {
    pub request_id: String,
    pub response_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    /// Base64 payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Commands the interceptor sends to a tab's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCommand {
    Enable { patterns: Vec<RequestPattern> },
    Disable,
    ContinueRequest(ContinueRequest),
    ContinueResponse { request_id: String },
    FulfillRequest(FulfillRequest),
    FailRequest { request_id: String, error_reason: String },
    GetResponseBody { request_id: String },
}

impl FetchCommand {
    /// Release a request untouched at the given stage
    pub fn release(request_id: impl Into<String>, stage: RequestStage) -> Self {
        let request_id = request_id.into();
        match stage {
            RequestStage::Request => FetchCommand::ContinueRequest(ContinueRequest {
                request_id,
                ..Default::default()
            }),
            RequestStage::Response => FetchCommand::ContinueResponse { request_id },
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            FetchCommand::Enable { .. } => "Fetch.enable",
            FetchCommand::Disable => "Fetch.disable",
            FetchCommand::ContinueRequest(_) => "Fetch.continueRequest",
            FetchCommand::ContinueResponse { .. } => "Fetch.continueResponse",
            FetchCommand::FulfillRequest(_) => "Fetch.fulfillRequest",
            FetchCommand::FailRequest { .. } => "Fetch.failRequest",
            FetchCommand::GetResponseBody { .. } => "Fetch.getResponseBody",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            FetchCommand::Enable { patterns } => json!({ "patterns": patterns }),
            FetchCommand::Disable => json!({}),
            FetchCommand::ContinueRequest(cmd) => json!(cmd),
            FetchCommand::ContinueResponse { request_id }
            | FetchCommand::GetResponseBody { request_id } => json!({ "requestId": request_id }),
            FetchCommand::FulfillRequest(cmd) => json!(cmd),
            FetchCommand::FailRequest {
                request_id,
                error_reason,
            } => json!({ "requestId": request_id, "errorReason": error_reason }),
        }
    }
}

/// Send a typed command through the host
pub async fn dispatch(
    host: &dyn DebuggerHost,
    tab_id: TabId,
    command: FetchCommand,
) -> Result<Value, HostError> {
    let method = command.method();
    tracing::debug!("tab {} -> {}", tab_id, method);
    host.send_command(tab_id, method, command.params()).await
}

/// Result of `Fetch.getResponseBody`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub body: String,
    #[serde(default)]
    pub base64_encoded: bool,
}

impl ResponseBody {
    pub fn from_result(result: Value) -> Result<Self, HostError> {
        serde_json::from_value(result).map_err(|e| HostError::MalformedResponse {
            method: "Fetch.getResponseBody".to_string(),
            message: e.to_string(),
        })
    }
}

/// Request half of a `Fetch.requestPaused` event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedRequestData {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub post_data: Option<String>,
}

/// Parameters of a `Fetch.requestPaused` event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPausedEvent {
    pub request_id: String,
    pub request: PausedRequestData,
    pub resource_type: String,
    #[serde(default)]
    pub response_status_code: Option<u16>,
    #[serde(default)]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(default)]
    pub response_error_reason: Option<String>,
}

impl RequestPausedEvent {
    /// Events carrying a status code were paused at the response stage
    pub fn stage(&self) -> RequestStage {
        stage_of(self.response_status_code.is_some())
    }

    pub fn headers(&self) -> Vec<HeaderEntry> {
        HeaderEntry::from_record(&self.request.headers)
    }
}

fn stage_of(has_status: bool) -> RequestStage {
    if has_status {
        RequestStage::Response
    } else {
        RequestStage::Request
    }
}

/// Best-effort id and stage from a payload that failed to decode
pub fn salvage_release_target(params: &Value) -> Option<(String, RequestStage)> {
    let request_id = params.get("requestId")?.as_str()?.to_string();
    let has_status = params
        .get("responseStatusCode")
        .map_or(false, |v| !v.is_null());
    Some((request_id, stage_of(has_status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_continue_request_carries_only_request_id() {
        let cmd = FetchCommand::release("req-1", RequestStage::Request);
        assert_eq!(cmd.method(), "Fetch.continueRequest");
        assert_eq!(cmd.params(), json!({ "requestId": "req-1" }));

        let cmd = FetchCommand::release("req-1", RequestStage::Response);
        assert_eq!(cmd.method(), "Fetch.continueResponse");
        assert_eq!(cmd.params(), json!({ "requestId": "req-1" }));
    }

    #[test]
    fn enable_serializes_patterns_in_order() {
        let cmd = FetchCommand::Enable {
            patterns: vec![
                RequestPattern {
                    url_pattern: "*foo*".into(),
                    request_stage: RequestStage::Request,
                },
                RequestPattern {
                    url_pattern: "*bar*".into(),
                    request_stage: RequestStage::Response,
                },
            ],
        };
        assert_eq!(
            cmd.params(),
            json!({ "patterns": [
                { "urlPattern": "*foo*", "requestStage": "Request" },
                { "urlPattern": "*bar*", "requestStage": "Response" },
            ]})
        );
    }

    #[test]
    fn continue_request_sends_every_edit_in_wire_names() {
        let cmd = FetchCommand::ContinueRequest(ContinueRequest {
            request_id: "req-3".into(),
            url: Some("https://api.example.com/v2".into()),
            method: Some("PUT".into()),
            headers: Some(vec![HeaderEntry::new("X-B", "2"), HeaderEntry::new("X-A", "1")]),
            post_data: Some("e30=".into()),
        });
        assert_eq!(
            cmd.params(),
            json!({
                "requestId": "req-3",
                "url": "https://api.example.com/v2",
                "method": "PUT",
                "headers": [{ "name": "X-B", "value": "2" }, { "name": "X-A", "value": "1" }],
                "postData": "e30=",
            })
        );
    }

    #[test]
    fn fulfill_omits_unset_fields() {
        let cmd = FetchCommand::FulfillRequest(FulfillRequest {
            request_id: "req-2".into(),
            response_code: 204,
            ..Default::default()
        });
        assert_eq!(
            cmd.params(),
            json!({ "requestId": "req-2", "responseCode": 204 })
        );
    }

    #[test]
    fn paused_event_detects_stage_and_keeps_header_order() {
        let event: RequestPausedEvent = serde_json::from_value(json!({
            "requestId": "req-3",
            "request": {
                "url": "https://api.example.com/users",
                "method": "GET",
                "headers": { "Zeta": "1", "Accept": "application/json" }
            },
            "resourceType": "XHR",
            "responseStatusCode": 200
        }))
        .unwrap();
        assert_eq!(event.stage(), RequestStage::Response);
        assert_eq!(
            event.headers(),
            vec![
                HeaderEntry::new("Zeta", "1"),
                HeaderEntry::new("Accept", "application/json"),
            ]
        );
    }

    #[test]
    fn salvage_reads_id_from_partial_payload() {
        let params = json!({ "requestId": "req-4", "responseStatusCode": 500 });
        assert_eq!(
            salvage_release_target(&params),
            Some(("req-4".to_string(), RequestStage::Response))
        );
        assert_eq!(salvage_release_target(&json!({ "request": {} })), None);
    }
}
