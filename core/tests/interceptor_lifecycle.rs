use std::sync::Arc;
use std::time::Duration;

use netsnare_core::api::{Interceptor, InterceptorConfig};
use netsnare_core::host::recording::RecordingHost;
use netsnare_core::host::HostEvent;
use netsnare_core::intercept::encoding;
use netsnare_core::models::{BackgroundMessage, InterceptRule, RequestStage, RuleAction};
use netsnare_core::storage::{MemorySettingsStore, RULES_KEY};
use serde_json::{json, Value};
use tokio::sync::broadcast;

const EXTENSION_ID: &str = "netsnare-it";

async fn next_message<F>(rx: &mut broadcast::Receiver<BackgroundMessage>, mut pred: F) -> BackgroundMessage
where
    F: FnMut(&BackgroundMessage) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let message = rx.recv().await.expect("broadcast channel open");
            if pred(&message) {
                return message;
            }
        }
    })
    .await
    .expect("message arrives in time")
}

async fn wait_until<F: FnMut() -> bool>(mut cond: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition reached in time")
}

fn paused_event(request_id: &str, url: &str) -> Value {
    json!({
        "requestId": request_id,
        "request": {
            "url": url,
            "method": "POST",
            "headers": { "Content-Type": "application/json" },
            "postData": "{\"name\":\"ada\"}"
        },
        "resourceType": "Fetch"
    })
}

fn stored_rule() -> InterceptRule {
    let mut rule = InterceptRule::new(
        "Hold user writes",
        "*api.example.com/users*",
        RequestStage::Request,
        RuleAction::Pause,
    );
    rule.id = "hold-users".into();
    rule
}

fn interceptor(host: Arc<RecordingHost>, settings: Arc<MemorySettingsStore>) -> Interceptor {
    let config = InterceptorConfig::default()
        .with_extension_id(EXTENSION_ID)
        .with_event_capacity(64);
    Interceptor::new(config, host, settings)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn paused_request_round_trip() {
    let host = Arc::new(RecordingHost::new());
    let settings = Arc::new(MemorySettingsStore::new());
    settings.put_raw_rules(json!([serde_json::to_value(stored_rule()).unwrap()]));
    settings.put_raw_enabled(json!(true));

    let interceptor = interceptor(host.clone(), settings.clone());
    let mut rx = interceptor.subscribe();
    let (tx, host_events) = interceptor.host_channel();
    let pump = interceptor.start(host_events);
    let handler = interceptor.handler();

    let state = handler
        .handle_raw(Some(EXTENSION_ID), json!({ "type": "ATTACH_TAB", "tabId": 11 }))
        .await;
    assert!(state.enabled);
    assert_eq!(state.attached_tabs, vec![11]);
    assert_eq!(
        host.commands_for("Fetch.enable")[0].params,
        json!({ "patterns": [{ "urlPattern": "*api.example.com/users*", "requestStage": "Request" }] })
    );

    // Not matched: released untouched
    tx.send(HostEvent::request_paused(
        11,
        paused_event("req-other", "https://cdn.example.com/app.js"),
    ))
    .await
    .unwrap();

    tx.send(HostEvent::request_paused(
        11,
        paused_event("req-1", "https://api.example.com/users/1"),
    ))
    .await
    .unwrap();

    let paused = next_message(&mut rx, |m| matches!(m, BackgroundMessage::RequestPaused { .. })).await;
    let BackgroundMessage::RequestPaused { request } = paused else {
        unreachable!()
    };
    assert_eq!(request.request_id, "req-1");
    assert_eq!(request.rule_id, "hold-users");
    assert_eq!(request.post_data.as_deref(), Some("{\"name\":\"ada\"}"));
    assert_eq!(interceptor.state().get().paused_requests.len(), 1);

    let state = handler
        .handle_raw(
            Some(EXTENSION_ID),
            json!({
                "type": "RESOLVE_REQUEST",
                "requestId": "req-1",
                "tabId": 11,
                "resolution": {
                    "type": "continue",
                    "modifications": { "postData": "{\"name\":\"grace\"}" }
                }
            }),
        )
        .await;
    assert!(state.paused_requests.is_empty());

    next_message(&mut rx, |m| {
        matches!(m, BackgroundMessage::RequestResolved { request_id } if request_id == "req-1")
    })
    .await;

    let continued = host.commands_for("Fetch.continueRequest");
    let released = continued
        .iter()
        .find(|c| c.params["requestId"] == "req-1")
        .expect("req-1 released");
    assert_eq!(
        released.params,
        json!({ "requestId": "req-1", "postData": encoding::encode("{\"name\":\"grace\"}") })
    );
    wait_until(|| {
        host.commands_for("Fetch.continueRequest")
            .iter()
            .any(|c| c.params == json!({ "requestId": "req-other" }))
    })
    .await;

    // Closing the tab forgets it and tells the UI
    tx.send(HostEvent::TabRemoved { tab_id: 11 }).await.unwrap();
    let update = next_message(&mut rx, |m| {
        matches!(m, BackgroundMessage::StateUpdated { state } if state.attached_tabs.is_empty())
    })
    .await;
    assert!(matches!(update, BackgroundMessage::StateUpdated { .. }));

    drop(tx);
    tokio::time::timeout(Duration::from_secs(2), pump)
        .await
        .expect("pump stops when host closes")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rule_edits_persist_and_resync_tabs() {
    let host = Arc::new(RecordingHost::new());
    let settings = Arc::new(MemorySettingsStore::new());
    let interceptor = interceptor(host.clone(), settings.clone());
    let (_tx, host_events) = interceptor.host_channel();
    let _pump = interceptor.start(host_events);
    let handler = interceptor.handler();

    handler
        .handle_raw(Some(EXTENSION_ID), json!({ "type": "ATTACH_TAB", "tabId": 2 }))
        .await;
    // No rules yet: catch everything at the request stage
    assert_eq!(
        host.commands_for("Fetch.enable")[0].params,
        json!({ "patterns": [{ "urlPattern": "*", "requestStage": "Request" }] })
    );
    host.clear_history();

    let rule = InterceptRule::new(
        "Mock flags",
        "*flags.json",
        RequestStage::Response,
        RuleAction::Pause,
    );
    let state = handler
        .handle_raw(
            Some(EXTENSION_ID),
            json!({ "type": "ADD_RULE", "rule": serde_json::to_value(&rule).unwrap() }),
        )
        .await;
    assert_eq!(state.rules, vec![rule.clone()]);

    let methods: Vec<_> = host.commands().into_iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["Fetch.disable", "Fetch.enable"]);
    assert_eq!(
        host.commands_for("Fetch.enable")[0].params,
        json!({ "patterns": [{ "urlPattern": "*flags.json", "requestStage": "Response" }] })
    );
    assert_eq!(
        settings.raw(RULES_KEY),
        Some(json!([serde_json::to_value(&rule).unwrap()]))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn settings_survive_restart_in_sqlite() {
    let storage_dir = tempfile::tempdir().unwrap();
    let config = InterceptorConfig::default()
        .with_storage_path(storage_dir.path())
        .with_extension_id(EXTENSION_ID);

    {
        let interceptor = Interceptor::open(config.clone(), Arc::new(RecordingHost::new()))
            .expect("interceptor opens");
        let (_tx, host_events) = interceptor.host_channel();
        let _pump = interceptor.start(host_events);
        let state = interceptor
            .handler()
            .handle_raw(Some(EXTENSION_ID), json!({ "type": "SET_ENABLED", "enabled": true }))
            .await;
        assert!(state.enabled);
    }

    let interceptor =
        Interceptor::open(config, Arc::new(RecordingHost::new())).expect("interceptor reopens");
    let (_tx, host_events) = interceptor.host_channel();
    let _pump = interceptor.start(host_events);
    let state = interceptor
        .handler()
        .handle_raw(Some(EXTENSION_ID), json!({ "type": "GET_STATE" }))
        .await;
    assert!(state.enabled);
}
