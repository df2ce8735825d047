//! Rule matching against paused-request events.

use crate::host::protocol::RequestPausedEvent;
use crate::intercept::pattern::{self, PatternCache};
use crate::models::{InterceptRule, RequestStage};

fn filters_match(event: &RequestPausedEvent, stage: RequestStage, rule: &InterceptRule) -> bool {
    if !rule.enabled || rule.request_stage != stage {
        return false;
    }
    if !rule.resource_types.is_empty()
        && !rule
            .resource_types
            .iter()
            .any(|t| t.as_str() == event.resource_type)
    {
        return false;
    }
    if !rule.http_methods.is_empty()
        && !rule
            .http_methods
            .iter()
            .any(|m| m.as_str() == event.request.method)
    {
        return false;
    }
    true
}

/// Whether `rule` applies to `event` at `stage`
pub fn matches(event: &RequestPausedEvent, stage: RequestStage, rule: &InterceptRule) -> bool {
    filters_match(event, stage, rule) && pattern::compile(&rule.url_pattern).test(&event.request.url)
}

/// Same as [`matches`], compiling the URL pattern through `cache`
pub fn matches_cached(
    cache: &PatternCache,
    event: &RequestPausedEvent,
    stage: RequestStage,
    rule: &InterceptRule,
) -> bool {
    filters_match(event, stage, rule) && cache.get(&rule.url_pattern).test(&event.request.url)
}

/// First rule in priority order that applies; nothing when interception is off
pub fn find_matching_rule<'a>(
    cache: &PatternCache,
    enabled: bool,
    rules: &'a [InterceptRule],
    event: &RequestPausedEvent,
    stage: RequestStage,
) -> Option<&'a InterceptRule> {
    if !enabled {
        return None;
    }
    rules
        .iter()
        .find(|rule| matches_cached(cache, event, stage, rule))
}
