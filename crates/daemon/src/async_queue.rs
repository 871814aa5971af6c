// SPDX-License-Identifier: MIT

//! Async result queue (`spec.md` §4.N): per-agent map keyed by `request_id`,
//! replaced with the result when the background operation finishes.

use agentkernel_core::AgentId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncResult {
    pub request_id: String,
    pub agent_id: AgentId,
    pub opcode: u8,
    pub success: bool,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum Slot {
    Pending,
    Ready(AsyncResult),
}

#[derive(Default)]
pub struct AsyncQueue {
    slots: Mutex<HashMap<(AgentId, String), Slot>>,
}

impl AsyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot when an async syscall is accepted, before the
    /// background operation has produced a result.
    pub fn begin(&self, agent: AgentId, request_id: String) {
        self.slots.lock().insert((agent, request_id), Slot::Pending);
    }

    /// Record the completion of a previously-begun async operation. A
    /// result for a request_id that was never begun (or already drained) is
    /// still recorded — the poller just sees it on the next drain.
    pub fn complete(&self, result: AsyncResult) {
        let key = (result.agent_id, result.request_id.clone());
        self.slots.lock().insert(key, Slot::Ready(result));
    }

    /// Destructively drain up to `max` ready results for an agent, FIFO by
    /// insertion is not preserved across a `HashMap`; callers that need a
    /// stable order should sort by `request_id` or rely on small `max`.
    pub fn poll(&self, agent: AgentId, max: usize) -> Vec<AsyncResult> {
        let mut slots = self.slots.lock();
        let ready_keys: Vec<(AgentId, String)> = slots
            .iter()
            .filter(|(k, v)| k.0 == agent && matches!(v, Slot::Ready(_)))
            .map(|(k, _)| k.clone())
            .take(max)
            .collect();
        ready_keys
            .into_iter()
            .filter_map(|key| match slots.remove(&key) {
                Some(Slot::Ready(result)) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn remove_agent(&self, agent: AgentId) {
        self.slots.lock().retain(|(owner, _), _| *owner != agent);
    }
}

#[cfg(test)]
#[path = "async_queue_tests.rs"]
mod tests;
