// SPDX-License-Identifier: MIT

//! Audit log (`spec.md` §4.L): a fixed-size ring of structured entries with
//! category filters.

use agentkernel_core::{AgentId, AuditCategory};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub timestamp: u64,
    pub category: AuditCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub action: String,
    pub details: serde_json::Value,
}

/// Per-category recording toggles (`set_audit_config`). Take effect for
/// subsequently-recorded entries only — already-ringed entries are never
/// retroactively dropped or redacted by a config change.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub max_entries: usize,
    pub log_syscalls: bool,
    pub log_security: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_entries: 10_000, log_syscalls: true, log_security: true }
    }
}

struct Inner {
    entries: VecDeque<AuditEntry>,
    next_id: u64,
    config: AuditConfig,
}

pub struct AuditLog {
    inner: Mutex<Inner>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                next_id: 1,
                config: AuditConfig::default(),
            }),
        }
    }

    /// Returns `false` without appending when the category's recording is
    /// toggled off by `set_audit_config`.
    pub fn append(
        &self,
        category: AuditCategory,
        agent_id: Option<AgentId>,
        action: impl Into<String>,
        details: serde_json::Value,
        timestamp: u64,
    ) -> bool {
        let mut inner = self.inner.lock();
        let enabled = match category {
            AuditCategory::Security => inner.config.log_security,
            AuditCategory::Syscall => inner.config.log_syscalls,
            _ => true,
        };
        if !enabled {
            return false;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let max_entries = inner.config.max_entries;
        inner.entries.push_back(AuditEntry { id, timestamp, category, agent_id, action: action.into(), details });
        while inner.entries.len() > max_entries {
            inner.entries.pop_front();
        }
        true
    }

    pub fn set_config(&self, config: AuditConfig) {
        self.inner.lock().config = config;
    }

    pub fn config(&self) -> AuditConfig {
        self.inner.lock().config.clone()
    }

    pub fn query(
        &self,
        category: Option<AuditCategory>,
        agent_id: Option<AgentId>,
        since_id: Option<u64>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .filter(|e| category.map(|c| c == e.category).unwrap_or(true))
            .filter(|e| agent_id.map(|a| Some(a) == e.agent_id).unwrap_or(true))
            .filter(|e| since_id.map(|s| e.id > s).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
