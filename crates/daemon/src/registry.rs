// SPDX-License-Identifier: MIT

//! Agent registry (`spec.md` §4.C): id allocation, name↔id mapping, and
//! lifecycle state. The registry is the sole owner of `AgentRecord`s; every
//! other subsystem holds only an `AgentId` and looks the record up here.

use agentkernel_core::{AgentId, IdAllocator, KernelError, Permissions};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of an agent (`spec.md` §3 `Agent.state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Starting,
    Running,
    Paused,
    Stopped,
    Crashed,
}

#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: Option<String>,
    pub pid: Option<u32>,
    pub state: AgentState,
    pub registered_at: u64,
    pub permissions: Permissions,
}

#[derive(Default)]
struct Inner {
    agents: HashMap<AgentId, AgentRecord>,
    names: HashMap<String, AgentId>,
}

/// Exclusively owns `AgentRecord`s behind a single reader/writer lock.
///
/// The name→id map is a bijection restricted to live agents: `register_name`
/// rejects a collision with a still-present agent, and `remove` clears the
/// reverse mapping only if it still points at the agent being removed (a
/// later agent may already have taken the name).
pub struct Registry {
    ids: IdAllocator,
    inner: RwLock<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { ids: IdAllocator::new(), inner: RwLock::new(Inner::default()) }
    }

    /// Allocate a fresh id on connection accept and seed its record.
    pub fn allocate(&self, registered_at: u64, permissions: Permissions) -> AgentId {
        let id = self.ids.allocate();
        let record = AgentRecord {
            id,
            name: None,
            pid: None,
            state: AgentState::Starting,
            registered_at,
            permissions,
        };
        self.inner.write().agents.insert(id, record);
        id
    }

    /// Insert an agent record under an externally-chosen id, for remote
    /// agents synthesized by the tunnel bridge (`spec.md` §4.P) rather than
    /// allocated via the local `IdAllocator`. Returns `false` without
    /// inserting if the id is already in use.
    pub fn insert_remote(&self, id: AgentId, registered_at: u64, permissions: Permissions) -> bool {
        let mut inner = self.inner.write();
        if inner.agents.contains_key(&id) {
            return false;
        }
        inner.agents.insert(
            id,
            AgentRecord { id, name: None, pid: None, state: AgentState::Running, registered_at, permissions },
        );
        true
    }

    pub fn register_name(&self, id: AgentId, name: String) -> Result<(), KernelError> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.names.get(&name) {
            if *existing != id && inner.agents.contains_key(existing) {
                return Err(KernelError::NameTaken(name));
            }
        }
        let old_name = inner.agents.get(&id).and_then(|a| a.name.clone());
        if let Some(old) = old_name {
            if old != name {
                inner.names.remove(&old);
            }
        }
        inner.names.insert(name.clone(), id);
        if let Some(agent) = inner.agents.get_mut(&id) {
            agent.name = Some(name);
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<AgentId> {
        self.inner.read().names.get(name).copied()
    }

    pub fn set_state(&self, id: AgentId, state: AgentState) {
        if let Some(agent) = self.inner.write().agents.get_mut(&id) {
            agent.state = state;
        }
    }

    pub fn set_pid(&self, id: AgentId, pid: u32) {
        if let Some(agent) = self.inner.write().agents.get_mut(&id) {
            agent.pid = Some(pid);
        }
    }

    pub fn set_permissions(&self, id: AgentId, permissions: Permissions) {
        if let Some(agent) = self.inner.write().agents.get_mut(&id) {
            agent.permissions = permissions;
        }
    }

    pub fn get(&self, id: AgentId) -> Option<AgentRecord> {
        self.inner.read().agents.get(&id).cloned()
    }

    /// Snapshot sorted by id, for deterministic `LIST` replies.
    pub fn list(&self) -> Vec<AgentRecord> {
        let mut agents: Vec<AgentRecord> = self.inner.read().agents.values().cloned().collect();
        agents.sort_by_key(|a| a.id);
        agents
    }

    /// Idempotent: removing an already-absent id is not an error, since
    /// shutdown races supervisor reaping against connection-close.
    pub fn remove(&self, id: AgentId) {
        let mut inner = self.inner.write();
        if let Some(agent) = inner.agents.remove(&id) {
            if let Some(name) = agent.name {
                if inner.names.get(&name) == Some(&id) {
                    inner.names.remove(&name);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
