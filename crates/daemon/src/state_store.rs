// SPDX-License-Identifier: MIT

//! State store (`spec.md` §4.J): keyed values with scope and TTL.
//!
//! `Session` entries are stored in their own key-only namespace, same as
//! `Global` — both are "not removed" for the life of a running kernel; they
//! only differ at a kernel-exit snapshot boundary (`Global` would be
//! persisted by an optional snapshot, `Session` would not), which this
//! workspace does not implement, so within one run they behave identically.
//! `Agent` entries are partitioned per `AgentId` and dropped when that
//! agent's record is removed from the registry.

use agentkernel_core::{AgentId, KernelError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Agent,
    Session,
}

#[derive(Debug, Clone)]
pub struct StateEntry {
    pub value: serde_json::Value,
    pub scope: Scope,
    pub owner_agent: Option<AgentId>,
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOp {
    Set,
    Delete,
    Expire,
}

impl StateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateOp::Set => "set",
            StateOp::Delete => "delete",
            StateOp::Expire => "expire",
        }
    }
}

#[derive(Default)]
struct Inner {
    global: HashMap<String, StateEntry>,
    session: HashMap<String, StateEntry>,
    agent: HashMap<(AgentId, String), StateEntry>,
}

#[derive(Default)]
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(
        &self,
        caller: AgentId,
        key: String,
        value: serde_json::Value,
        scope: Scope,
        ttl_secs: Option<u64>,
        now_ms: u64,
    ) {
        let expires_at = ttl_secs.map(|s| now_ms + s * 1000);
        let entry = StateEntry { value, scope, owner_agent: Some(caller), expires_at };
        let mut inner = self.inner.lock();
        match scope {
            Scope::Global => {
                inner.global.insert(key, entry);
            }
            Scope::Session => {
                inner.session.insert(key, entry);
            }
            Scope::Agent => {
                inner.agent.insert((caller, key), entry);
            }
        }
    }

    /// Checks `Agent`, then `Global`, then `Session`, for the given caller;
    /// the first non-expired match wins. Expired entries are purged as a
    /// side effect (lazy expiry on access).
    pub fn fetch(
        &self,
        caller: AgentId,
        key: &str,
        now_ms: u64,
    ) -> Option<(serde_json::Value, Scope)> {
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.agent.get(&(caller, key.to_string())) {
            if is_expired(entry, now_ms) {
                inner.agent.remove(&(caller, key.to_string()));
            } else {
                return Some((entry.value.clone(), Scope::Agent));
            }
        }
        if let Some(entry) = inner.global.get(key) {
            if is_expired(entry, now_ms) {
                inner.global.remove(key);
            } else {
                return Some((entry.value.clone(), Scope::Global));
            }
        }
        if let Some(entry) = inner.session.get(key) {
            if is_expired(entry, now_ms) {
                inner.session.remove(key);
            } else {
                return Some((entry.value.clone(), Scope::Session));
            }
        }
        None
    }

    pub fn delete(&self, caller: AgentId, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let mut deleted = inner.agent.remove(&(caller, key.to_string())).is_some();
        deleted |= inner.global.remove(key).is_some();
        deleted |= inner.session.remove(key).is_some();
        deleted
    }

    pub fn list_keys(&self, caller: AgentId, prefix: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = Vec::new();
        keys.extend(
            inner
                .agent
                .keys()
                .filter(|(owner, k)| *owner == caller && k.starts_with(prefix))
                .map(|(_, k)| k.clone()),
        );
        keys.extend(inner.global.keys().filter(|k| k.starts_with(prefix)).cloned());
        keys.extend(inner.session.keys().filter(|k| k.starts_with(prefix)).cloned());
        keys.sort();
        keys.dedup();
        keys
    }

    /// Drop every `Agent`-scoped entry owned by a terminated agent.
    pub fn remove_agent(&self, id: AgentId) {
        self.inner.lock().agent.retain(|(owner, _), _| *owner != id);
    }

    /// Periodic sweep: evicts expired entries across all scopes and returns
    /// the `(key, scope, owner)` of each one, for `StateChanged{op: expire}`
    /// event emission by the caller.
    pub fn sweep_expired(&self, now_ms: u64) -> Vec<(String, Scope, Option<AgentId>)> {
        let mut inner = self.inner.lock();
        let mut expired = Vec::new();

        inner.global.retain(|k, v| {
            let keep = !is_expired(v, now_ms);
            if !keep {
                expired.push((k.clone(), Scope::Global, v.owner_agent));
            }
            keep
        });
        inner.session.retain(|k, v| {
            let keep = !is_expired(v, now_ms);
            if !keep {
                expired.push((k.clone(), Scope::Session, v.owner_agent));
            }
            keep
        });
        inner.agent.retain(|(owner, k), v| {
            let keep = !is_expired(v, now_ms);
            if !keep {
                expired.push((k.clone(), Scope::Agent, Some(*owner)));
            }
            keep
        });

        expired
    }
}

fn is_expired(entry: &StateEntry, now_ms: u64) -> bool {
    entry.expires_at.map(|exp| now_ms > exp).unwrap_or(false)
}

pub fn require_exists<T>(value: Option<T>, key: &str) -> Result<T, KernelError> {
    value.ok_or_else(|| KernelError::StateKeyNotFound(key.to_string()))
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
