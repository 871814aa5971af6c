// SPDX-License-Identifier: MIT

//! Audit entry vocabulary (`spec.md` §3 `AuditEntry`, §4.L). The ring buffer
//! and query logic live in the daemon crate; this is just the shared shape
//! so the permission engine (in daemon) and the audit log (also in daemon)
//! agree on categories without importing each other.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Security,
    AgentLifecycle,
    Ipc,
    State,
    Resource,
    Network,
    World,
    Syscall,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "Security",
            Category::AgentLifecycle => "AgentLifecycle",
            Category::Ipc => "Ipc",
            Category::State => "State",
            Category::Resource => "Resource",
            Category::Network => "Network",
            Category::World => "World",
            Category::Syscall => "Syscall",
        }
    }
}
