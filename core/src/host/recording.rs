//! In-process host that records every call.
//!
//! Drives the interceptor without a browser: commands succeed with `{}`
//! unless a response or failure was queued for that method, and a tab marked
//! closed rejects everything.

use crate::host::{DebuggerHost, HostError, TabId};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// One command as the host received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub tab_id: TabId,
    pub method: String,
    pub params: Value,
}

#[derive(Default)]
struct Recorded {
    attached: HashSet<TabId>,
    closed: HashSet<TabId>,
    attach_calls: Vec<TabId>,
    detach_calls: Vec<TabId>,
    commands: Vec<RecordedCommand>,
    scripted: HashMap<String, VecDeque<Result<Value, HostError>>>,
}

#[derive(Default)]
pub struct RecordingHost {
    inner: Mutex<Recorded>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the next result for `method`; queued results are consumed in order
    pub fn enqueue(&self, method: &str, result: Result<Value, HostError>) {
        self.lock()
            .scripted
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn respond_with(&self, method: &str, value: Value) {
        self.enqueue(method, Ok(value));
    }

    pub fn fail_next(&self, method: &str, message: &str) {
        self.enqueue(method, Err(HostError::command(method, message)));
    }

    /// Simulate the user closing the tab: every later call for it fails
    pub fn close_tab(&self, tab_id: TabId) {
        let mut inner = self.lock();
        inner.attached.remove(&tab_id);
        inner.closed.insert(tab_id);
    }

    pub fn is_attached(&self, tab_id: TabId) -> bool {
        self.lock().attached.contains(&tab_id)
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.lock().commands.clone()
    }

    pub fn commands_for(&self, method: &str) -> Vec<RecordedCommand> {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn attach_calls(&self) -> Vec<TabId> {
        self.lock().attach_calls.clone()
    }

    pub fn detach_calls(&self) -> Vec<TabId> {
        self.lock().detach_calls.clone()
    }

    /// Forget recorded calls, keeping sessions and queued results
    pub fn clear_history(&self) {
        let mut inner = self.lock();
        inner.commands.clear();
        inner.attach_calls.clear();
        inner.detach_calls.clear();
    }
}

#[async_trait]
impl DebuggerHost for RecordingHost {
    async fn attach(&self, tab_id: TabId, _protocol_version: &str) -> Result<(), HostError> {
        let mut inner = self.lock();
        inner.attach_calls.push(tab_id);
        if inner.closed.contains(&tab_id) {
            return Err(HostError::TabClosed(tab_id));
        }
        inner.attached.insert(tab_id);
        Ok(())
    }

    async fn detach(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut inner = self.lock();
        inner.detach_calls.push(tab_id);
        if inner.attached.remove(&tab_id) {
            Ok(())
        } else {
            Err(HostError::NotAttached(tab_id))
        }
    }

    async fn send_command(
        &self,
        tab_id: TabId,
        method: &str,
        params: Value,
    ) -> Result<Value, HostError> {
        let mut inner = self.lock();
        inner.commands.push(RecordedCommand {
            tab_id,
            method: method.to_string(),
            params,
        });
        if inner.closed.contains(&tab_id) {
            return Err(HostError::TabClosed(tab_id));
        }
        match inner.scripted.get_mut(method).and_then(VecDeque::pop_front) {
            Some(result) => result,
            None => Ok(json!({})),
        }
    }
}
