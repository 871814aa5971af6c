// SPDX-License-Identifier: MIT

//! Event bus (`spec.md` §4.K): per-agent subscriptions and pending queues.
//! `emit` of a non-`Custom` type from an agent is rejected (`spec.md` §9
//! Open Question, resolved: reject) — only kernel-internal producers use
//! [`EventBus::publish`] for the structural types.

use agentkernel_core::{AgentId, EventType, KernelError, KernelEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

const PENDING_CAPACITY: usize = 256;

struct AgentQueue {
    subscriptions: HashSet<EventType>,
    pending: VecDeque<KernelEvent>,
}

impl Default for AgentQueue {
    fn default() -> Self {
        Self { subscriptions: HashSet::new(), pending: VecDeque::new() }
    }
}

#[derive(Default)]
pub struct EventBus {
    agents: Mutex<HashMap<AgentId, AgentQueue>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, id: AgentId, types: &[EventType]) {
        let mut agents = self.agents.lock();
        let queue = agents.entry(id).or_default();
        queue.subscriptions.extend(types.iter().copied());
    }

    pub fn unsubscribe(&self, id: AgentId, types: &[EventType]) {
        let mut agents = self.agents.lock();
        if let Some(queue) = agents.get_mut(&id) {
            for t in types {
                queue.subscriptions.remove(t);
            }
        }
    }

    /// Kernel-internal producers call this directly; it is not gated by the
    /// `Custom`-only rule that `emit` enforces for agent-originated events.
    pub fn publish(&self, event: KernelEvent) {
        let mut agents = self.agents.lock();
        for queue in agents.values_mut() {
            if queue.subscriptions.contains(&event.kind) {
                if queue.pending.len() >= PENDING_CAPACITY {
                    queue.pending.pop_front();
                }
                queue.pending.push_back(event.clone());
            }
        }
    }

    /// Publish only to one agent's queue, regardless of subscription —
    /// used by callers (e.g. `SyscallBlocked`) that already checked
    /// subscription state themselves via [`EventBus::is_subscribed`].
    pub fn publish_to(&self, id: AgentId, event: KernelEvent) {
        let mut agents = self.agents.lock();
        let queue = agents.entry(id).or_default();
        if queue.pending.len() >= PENDING_CAPACITY {
            queue.pending.pop_front();
        }
        queue.pending.push_back(event);
    }

    pub fn is_subscribed(&self, id: AgentId, kind: EventType) -> bool {
        self.agents.lock().get(&id).map(|q| q.subscriptions.contains(&kind)).unwrap_or(false)
    }

    /// Agent-originated emission: only `Custom` events may be emitted this
    /// way; anything else is rejected rather than silently rewritten.
    pub fn emit(&self, source: AgentId, kind: EventType, data: serde_json::Value, emitted_at: u64) -> Result<(), KernelError> {
        if kind != EventType::Custom {
            return Err(KernelError::BadRequest(format!(
                "agents may only emit Custom events, got {kind:?}"
            )));
        }
        self.publish(KernelEvent::new(kind, data, emitted_at).with_source(source));
        Ok(())
    }

    pub fn poll(&self, id: AgentId, max: usize) -> Vec<KernelEvent> {
        let mut agents = self.agents.lock();
        let Some(queue) = agents.get_mut(&id) else { return Vec::new() };
        let take = max.min(queue.pending.len());
        queue.pending.drain(..take).collect()
    }

    pub fn remove_agent(&self, id: AgentId) {
        self.agents.lock().remove(&id);
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
