// SPDX-License-Identifier: MIT

//! IPC subsystem (`spec.md` §4.I): per-agent mailboxes, name routing,
//! broadcast. Ordering is FIFO per sender→receiver pair; across senders,
//! only enqueue order into a given mailbox is preserved.

use agentkernel_core::AgentId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

const MAILBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcMessage {
    pub from: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    pub message: serde_json::Value,
    pub enqueued_at: u64,
}

#[derive(Default)]
pub struct Mailboxes {
    boxes: Mutex<HashMap<AgentId, VecDeque<IpcMessage>>>,
}

/// Returned by [`Mailboxes::send`] so the caller can decide whether to emit
/// `MessageReceived` (only fires when the mailbox grows from 0 to 1).
pub struct SendOutcome {
    pub became_non_empty: bool,
    pub dropped_oldest: bool,
}

impl Mailboxes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, to: AgentId, message: IpcMessage) -> SendOutcome {
        let mut boxes = self.boxes.lock();
        let mailbox = boxes.entry(to).or_default();
        let became_non_empty = mailbox.is_empty();
        let mut dropped_oldest = false;
        if mailbox.len() >= MAILBOX_CAPACITY {
            mailbox.pop_front();
            dropped_oldest = true;
        }
        mailbox.push_back(message);
        SendOutcome { became_non_empty, dropped_oldest }
    }

    pub fn recv(&self, id: AgentId, max: usize, now_ms: u64) -> Vec<(IpcMessage, u64)> {
        let mut boxes = self.boxes.lock();
        let Some(mailbox) = boxes.get_mut(&id) else { return Vec::new() };
        let take = max.min(mailbox.len());
        mailbox
            .drain(..take)
            .map(|m| {
                let age = now_ms.saturating_sub(m.enqueued_at);
                (m, age)
            })
            .collect()
    }

    pub fn remove_agent(&self, id: AgentId) {
        self.boxes.lock().remove(&id);
    }
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
