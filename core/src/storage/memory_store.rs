use crate::storage::{SettingsStore, ENABLED_KEY, RULES_KEY};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Settings held in memory; used by tests and embedders that persist elsewhere
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
    fail_io: AtomicBool,
    saves: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an arbitrary payload under the rules key, bypassing validation
    pub fn put_raw_rules(&self, value: Value) {
        self.values().insert(RULES_KEY.to_string(), value);
    }

    pub fn put_raw_enabled(&self, value: Value) {
        self.values().insert(ENABLED_KEY.to_string(), value);
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }

    /// Make every subsequent load and save fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_io.store(failing, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_raw(&self, key: &str) -> anyhow::Result<Option<Value>> {
        if self.fail_io.load(Ordering::SeqCst) {
            anyhow::bail!("settings backend unavailable");
        }
        Ok(self.raw(key))
    }

    async fn save_raw(&self, key: &str, value: Value) -> anyhow::Result<()> {
        if self.fail_io.load(Ordering::SeqCst) {
            anyhow::bail!("settings backend unavailable");
        }
        self.values().insert(key.to_string(), value);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
