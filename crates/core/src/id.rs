// SPDX-License-Identifier: MIT

//! Agent identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifier for the kernel itself: source of internal events, destination
/// of orchestrator-addressed messages. Never allocated to a connection.
pub const KERNEL_AGENT_ID: AgentId = AgentId(0);

/// Monotonically increasing identifier for an agent connection.
///
/// Allocated on socket accept, never reused within a kernel lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl AgentId {
    pub const fn is_kernel(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Allocates [`AgentId`]s starting at 1 (0 is reserved for the kernel).
///
/// Shared across the registry; a single atomic counter is sufficient since
/// ids only need to be unique and increasing, never reused.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU32::new(1) }
    }

    /// Allocate the next id. Wraps past `u32::MAX` back to 1, skipping 0;
    /// a kernel would need to outlive 4 billion connections to notice.
    pub fn allocate(&self) -> AgentId {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return AgentId(id);
            }
        }
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
