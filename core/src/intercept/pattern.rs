//! URL glob patterns
//!
//! `*` matches any run of characters (including none); every other character
//! is literal. Matching is case-insensitive and anchored at both ends.

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// Compiled URL glob
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Option<Regex>,
}

impl UrlPattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn test(&self, subject: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(subject),
            None => false,
        }
    }
}

/// Compile a glob into an anchored, case-insensitive matcher
pub fn compile(pattern: &str) -> UrlPattern {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let regex = RegexBuilder::new(&format!("^{body}$"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build();
    match regex {
        Ok(regex) => UrlPattern {
            source: pattern.to_string(),
            regex: Some(regex),
        },
        Err(err) => {
            // Only reachable when the pattern exceeds the regex size limit
            tracing::warn!("URL pattern {:?} cannot be compiled: {}", pattern, err);
            UrlPattern {
                source: pattern.to_string(),
                regex: None,
            }
        }
    }
}

/// Compiled patterns keyed by their source string
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: DashMap<String, Arc<UrlPattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pattern: &str) -> Arc<UrlPattern> {
        if let Some(hit) = self.compiled.get(pattern) {
            return Arc::clone(hit.value());
        }
        let compiled = Arc::new(compile(pattern));
        self.compiled
            .insert(pattern.to_string(), Arc::clone(&compiled));
        compiled
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Drop entries for patterns no longer in use
    pub fn retain_patterns<'a>(&self, live: impl IntoIterator<Item = &'a str>) {
        let live: std::collections::HashSet<&str> = live.into_iter().collect();
        self.compiled.retain(|key, _| live.contains(key.as_str()));
    }
}
