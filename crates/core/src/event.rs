// SPDX-License-Identifier: MIT

//! Kernel event vocabulary (`spec.md` §3 `KernelEvent`, §4.K).

use crate::id::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AgentSpawned,
    AgentExited,
    MessageReceived,
    StateChanged,
    SyscallBlocked,
    ResourceWarning,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<AgentId>,
    pub emitted_at: u64,
}

impl KernelEvent {
    pub fn new(kind: EventType, data: serde_json::Value, emitted_at: u64) -> Self {
        Self { kind, data, source_agent: None, emitted_at }
    }

    pub fn with_source(mut self, source: AgentId) -> Self {
        self.source_agent = Some(source);
        self
    }
}
