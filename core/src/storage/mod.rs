//! Durable settings: rules and the global enabled flag
//!
//! Settings are JSON values under fixed keys in a key/value backend. Loading
//! is forgiving: entries that do not decode are dropped with a warning and the
//! rest load normally.

mod memory_store;
mod sqlite_store;

pub use memory_store::MemorySettingsStore;
pub use sqlite_store::SqliteSettingsStore;

use crate::models::InterceptRule;
use async_trait::async_trait;
use serde_json::Value;

pub const RULES_KEY: &str = "intercept_rules";
pub const ENABLED_KEY: &str = "intercept_enabled";

/// Key/value persistence for interceptor settings.
///
/// Backends implement the raw pair; the typed helpers apply validation.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_raw(&self, key: &str) -> anyhow::Result<Option<Value>>;

    async fn save_raw(&self, key: &str, value: Value) -> anyhow::Result<()>;

    async fn load_rules(&self) -> anyhow::Result<Vec<InterceptRule>> {
        Ok(parse_rules(self.load_raw(RULES_KEY).await?))
    }

    async fn save_rules(&self, rules: &[InterceptRule]) -> anyhow::Result<()> {
        self.save_raw(RULES_KEY, serde_json::to_value(rules)?).await
    }

    async fn load_enabled(&self) -> anyhow::Result<bool> {
        Ok(parse_enabled(self.load_raw(ENABLED_KEY).await?))
    }

    async fn save_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        self.save_raw(ENABLED_KEY, Value::Bool(enabled)).await
    }
}

/// Decode stored rules, keeping every entry that is a valid rule
pub fn parse_rules(raw: Option<Value>) -> Vec<InterceptRule> {
    let items = match raw {
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!("Stored rules are not a list, ignoring: {}", other);
            return Vec::new();
        }
        None => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|mut item| {
            // Rules saved before method filters existed have no httpMethods
            if let Value::Object(obj) = &mut item {
                if !obj.get("httpMethods").map_or(false, Value::is_array) {
                    obj.insert("httpMethods".into(), Value::Array(Vec::new()));
                }
            }
            match serde_json::from_value::<InterceptRule>(item.clone()) {
                Ok(rule) => Some(rule),
                Err(err) => {
                    tracing::warn!("Dropping invalid rule from storage ({}): {}", err, item);
                    None
                }
            }
        })
        .collect()
}

/// Anything but a stored boolean reads as disabled
pub fn parse_enabled(raw: Option<Value>) -> bool {
    matches!(raw, Some(Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeaderEntry, RequestStage, RuleAction};
    use serde_json::json;

    fn valid_rule(id: &str) -> Value {
        json!({
            "id": id,
            "enabled": true,
            "urlPattern": "*api*",
            "resourceTypes": [],
            "httpMethods": ["GET"],
            "requestStage": "Request",
            "action": { "type": "pause" },
            "label": "API"
        })
    }

    #[test]
    fn drops_invalid_entries_and_keeps_the_rest() {
        let raw = json!([
            valid_rule("r1"),
            { "id": "broken" },
            42,
            null,
            {
                "id": "r2",
                "enabled": true,
                "urlPattern": "*",
                "resourceTypes": [],
                "requestStage": "Sideways",
                "action": { "type": "pause" },
                "label": "bad stage"
            },
            {
                "id": "r3",
                "enabled": true,
                "urlPattern": "*",
                "resourceTypes": [],
                "requestStage": "Request",
                "action": { "type": "teleport" },
                "label": "bad action"
            },
            valid_rule("r4"),
        ]);
        let rules = parse_rules(Some(raw));
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r4"]);
        assert_eq!(rules[0].action, RuleAction::Pause);
    }

    #[test]
    fn backfills_missing_or_malformed_http_methods() {
        let mut missing = valid_rule("r1");
        missing.as_object_mut().unwrap().remove("httpMethods");
        let mut wrong_type = valid_rule("r2");
        wrong_type["httpMethods"] = json!("GET");

        let rules = parse_rules(Some(json!([missing, wrong_type])));
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.http_methods.is_empty()));
        assert_eq!(rules[0].request_stage, RequestStage::Request);
    }

    #[test]
    fn keeps_modify_rules_with_header_objects() {
        let mut rule = valid_rule("r1");
        rule["action"] = json!({
            "type": "modify-request",
            "modifications": { "url": "https://api.example.com/v2", "headers": { "X-Env": "staging" } }
        });

        let rules = parse_rules(Some(json!([rule])));
        assert_eq!(rules.len(), 1);
        let RuleAction::ModifyRequest { modifications } = &rules[0].action else {
            panic!("expected modify-request, got {:?}", rules[0].action);
        };
        assert_eq!(
            modifications.headers,
            Some(vec![HeaderEntry::new("X-Env", "staging")])
        );
        assert_eq!(modifications.url.as_deref(), Some("https://api.example.com/v2"));
    }

    #[test]
    fn non_list_payload_degrades_to_empty() {
        assert!(parse_rules(Some(json!({ "id": "r1" }))).is_empty());
        assert!(parse_rules(Some(json!("rules"))).is_empty());
        assert!(parse_rules(None).is_empty());
    }

    #[test]
    fn enabled_flag_defaults_to_false() {
        assert!(parse_enabled(Some(json!(true))));
        assert!(!parse_enabled(Some(json!(false))));
        assert!(!parse_enabled(Some(json!("true"))));
        assert!(!parse_enabled(Some(json!(1))));
        assert!(!parse_enabled(None));
    }
}
