//! Interception rule model
//!
//! A rule pairs a match policy (URL glob, resource types, methods, stage) with
//! exactly one action to run when it matches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// HTTP methods a rule can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpMethod {
    /// Wire spelling, as the protocol reports it on a paused request
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "CONNECT" => Ok(HttpMethod::Connect),
            "TRACE" => Ok(HttpMethod::Trace),
            other => Err(format!("unknown HTTP method: {other}")),
        }
    }
}

/// Resource categories reported by the debugging protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    TextTrack,
    #[serde(rename = "XHR")]
    Xhr,
    Fetch,
    Prefetch,
    EventSource,
    WebSocket,
    Manifest,
    SignedExchange,
    Ping,
    #[serde(rename = "CSPViolationReport")]
    CspViolationReport,
    Preflight,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "Document",
            ResourceType::Stylesheet => "Stylesheet",
            ResourceType::Image => "Image",
            ResourceType::Media => "Media",
            ResourceType::Font => "Font",
            ResourceType::Script => "Script",
            ResourceType::TextTrack => "TextTrack",
            ResourceType::Xhr => "XHR",
            ResourceType::Fetch => "Fetch",
            ResourceType::Prefetch => "Prefetch",
            ResourceType::EventSource => "EventSource",
            ResourceType::WebSocket => "WebSocket",
            ResourceType::Manifest => "Manifest",
            ResourceType::SignedExchange => "SignedExchange",
            ResourceType::Ping => "Ping",
            ResourceType::CspViolationReport => "CSPViolationReport",
            ResourceType::Preflight => "Preflight",
            ResourceType::Other => "Other",
        }
    }
}

/// Phase of the exchange a rule fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStage {
    Request,
    Response,
}

/// A single header as an ordered name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Header object (`{ "Name": "value" }`) to ordered pairs; non-string
    /// values keep their JSON text
    pub fn from_record(headers: &Map<String, Value>) -> Vec<HeaderEntry> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                HeaderEntry::new(name.clone(), value)
            })
            .collect()
    }
}

/// Header lists stored on rules as a `{ name: value }` object. Decoding also
/// takes the `[{ name, value }]` list form.
mod header_record {
    use super::HeaderEntry;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::{Map, Value};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Record(Map<String, Value>),
        List(Vec<HeaderEntry>),
    }

    pub fn serialize<S>(headers: &Option<Vec<HeaderEntry>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match headers {
            Some(headers) => {
                serializer.collect_map(headers.iter().map(|h| (h.name.as_str(), h.value.as_str())))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<HeaderEntry>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Shape>::deserialize(deserializer)?.map(|shape| match shape {
            Shape::Record(map) => HeaderEntry::from_record(&map),
            Shape::List(list) => list,
        }))
    }
}

/// Replacement fields sent when a user continues a paused request; absent
/// fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestModifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

/// Request edits carried by a modify-request rule; absent fields are left
/// untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRewrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "header_record")]
    pub headers: Option<Vec<HeaderEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

/// Fixed response served by a mock rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponse {
    pub response_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// What to do with a request once a rule matches it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleAction {
    /// Hold the request until a user resolves it
    Pause,
    ModifyRequest { modifications: RequestRewrite },
    MockResponse { response: MockResponse },
    /// Same request, different URL
    Proxy {
        #[serde(rename = "targetUrl")]
        target_url: String,
    },
}

impl RuleAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::Pause => "pause",
            RuleAction::ModifyRequest { .. } => "modify-request",
            RuleAction::MockResponse { .. } => "mock-response",
            RuleAction::Proxy { .. } => "proxy",
        }
    }
}

/// User-authored interception rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptRule {
    pub id: String,
    pub enabled: bool,
    pub url_pattern: String,
    pub resource_types: Vec<ResourceType>,
    #[serde(default)]
    pub http_methods: Vec<HttpMethod>,
    pub request_stage: RequestStage,
    pub action: RuleAction,
    pub label: String,
}

impl InterceptRule {
    /// Create an enabled rule with a fresh id and no resource/method filters
    pub fn new(
        label: impl Into<String>,
        url_pattern: impl Into<String>,
        request_stage: RequestStage,
        action: RuleAction,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            enabled: true,
            url_pattern: url_pattern.into(),
            resource_types: Vec::new(),
            http_methods: Vec::new(),
            request_stage,
            action,
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_uses_kebab_case_type_tag() {
        let action = RuleAction::ModifyRequest {
            modifications: RequestRewrite {
                url: Some("https://api.example.com/v2".into()),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "modify-request",
                "modifications": { "url": "https://api.example.com/v2" }
            })
        );

        let proxy: RuleAction = serde_json::from_value(json!({
            "type": "proxy",
            "targetUrl": "https://staging.example.com"
        }))
        .unwrap();
        assert_eq!(
            proxy,
            RuleAction::Proxy {
                target_url: "https://staging.example.com".into()
            }
        );
    }

    #[test]
    fn rule_deserializes_from_camel_case_and_backfills_methods() {
        let rule: InterceptRule = serde_json::from_value(json!({
            "id": "r1",
            "enabled": true,
            "urlPattern": "*api*",
            "resourceTypes": ["XHR", "CSPViolationReport"],
            "requestStage": "Response",
            "action": { "type": "pause" },
            "label": "API"
        }))
        .unwrap();
        assert!(rule.http_methods.is_empty());
        assert_eq!(
            rule.resource_types,
            vec![ResourceType::Xhr, ResourceType::CspViolationReport]
        );
        assert_eq!(rule.request_stage, RequestStage::Response);
    }

    #[test]
    fn modify_rule_headers_decode_from_object_in_order() {
        let action: RuleAction = serde_json::from_value(json!({
            "type": "modify-request",
            "modifications": {
                "headers": { "X-Custom": "value", "Authorization": "Bearer t" }
            }
        }))
        .unwrap();
        let RuleAction::ModifyRequest { modifications } = &action else {
            panic!("expected modify-request, got {action:?}");
        };
        assert_eq!(
            modifications.headers,
            Some(vec![
                HeaderEntry::new("X-Custom", "value"),
                HeaderEntry::new("Authorization", "Bearer t"),
            ])
        );

        // Written back in the same object form
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "type": "modify-request",
                "modifications": {
                    "headers": { "X-Custom": "value", "Authorization": "Bearer t" }
                }
            })
        );
    }

    #[test]
    fn modify_rule_headers_also_accept_list_form() {
        let rewrite: RequestRewrite = serde_json::from_value(json!({
            "headers": [{ "name": "X-Custom", "value": "value" }]
        }))
        .unwrap();
        assert_eq!(rewrite.headers, Some(vec![HeaderEntry::new("X-Custom", "value")]));

        let rewrite: RequestRewrite = serde_json::from_value(json!({ "headers": null })).unwrap();
        assert!(rewrite.headers.is_none());
    }

    #[test]
    fn new_rule_gets_unique_id() {
        let a = InterceptRule::new("a", "*", RequestStage::Request, RuleAction::Pause);
        let b = InterceptRule::new("b", "*", RequestStage::Request, RuleAction::Pause);
        assert_ne!(a.id, b.id);
        assert!(a.enabled);
    }

    #[test]
    fn method_round_trips_through_wire_spelling() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(HttpMethod::Options.as_str(), "OPTIONS");
        assert!("BREW".parse::<HttpMethod>().is_err());
    }
}
