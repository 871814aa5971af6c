// SPDX-License-Identifier: MIT

//! Kernel context (`spec.md` §9: "thread an explicit kernel context through
//! handlers" rather than reaching through global mutable singletons). Every
//! dispatch handler takes `&KernelContext` plus the calling `AgentId`.

use crate::async_queue::AsyncQueue;
use crate::audit::AuditLog;
use crate::config::KernelConfig;
use crate::events::EventBus;
use crate::ipc::Mailboxes;
use crate::metrics::Metrics;
use crate::recorder::Recorder;
use crate::registry::Registry;
use crate::state_store::StateStore;
use crate::supervisor::Supervisor;
use crate::tunnel::TunnelBridge;
use agentkernel_core::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

pub struct KernelContext {
    pub config: Arc<KernelConfig>,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<Registry>,
    pub supervisor: Arc<Supervisor>,
    pub audit: Arc<AuditLog>,
    pub events: Arc<EventBus>,
    pub state: Arc<StateStore>,
    pub mailboxes: Arc<Mailboxes>,
    pub async_queue: Arc<AsyncQueue>,
    pub recorder: Arc<Recorder>,
    pub metrics: Arc<Metrics>,
    pub tunnel: Mutex<Option<Arc<TunnelBridge>>>,
    /// Per-agent kernel-tracked syscall counters feeding `metrics_agent`'s
    /// `syscall_count` field.
    pub syscall_counts: Mutex<std::collections::HashMap<agentkernel_core::AgentId, u64>>,
    /// Wall-clock the kernel started, for `HELLO`'s `uptime` field.
    pub boot_epoch_ms: u64,
    /// Result of the most recent `REPLAY_START`, read back by `REPLAY_STATUS`.
    pub replay_status: Mutex<Option<serde_json::Value>>,
    /// Notified once, by `EXIT`, to tell `Transport::run` to stop accepting
    /// and let `main` remove the listening socket (`spec.md` §5, §6).
    pub shutdown: Notify,
}

impl KernelContext {
    pub fn new(config: Arc<KernelConfig>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let registry = Arc::new(Registry::new());
        let events = Arc::new(EventBus::new());
        let audit = Arc::new(AuditLog::new());
        let supervisor = Supervisor::new(Arc::clone(&registry), Arc::clone(&events), Arc::clone(&audit), Arc::clone(&clock));
        let boot_epoch_ms = clock.epoch_ms();

        Arc::new(Self {
            config,
            clock,
            registry,
            supervisor,
            audit,
            events,
            state: Arc::new(StateStore::new()),
            mailboxes: Arc::new(Mailboxes::new()),
            async_queue: Arc::new(AsyncQueue::new()),
            recorder: Arc::new(Recorder::new()),
            metrics: Arc::new(Metrics::new()),
            tunnel: Mutex::new(None),
            syscall_counts: Mutex::new(std::collections::HashMap::new()),
            boot_epoch_ms,
            replay_status: Mutex::new(None),
            shutdown: Notify::new(),
        })
    }

    pub fn bump_syscall_count(&self, agent: agentkernel_core::AgentId) -> u64 {
        let mut counts = self.syscall_counts.lock();
        let entry = counts.entry(agent).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn remove_agent_state(&self, agent: agentkernel_core::AgentId) {
        self.events.remove_agent(agent);
        self.mailboxes.remove_agent(agent);
        self.async_queue.remove_agent(agent);
        self.state.remove_agent(agent);
        self.syscall_counts.lock().remove(&agent);
        self.registry.remove(agent);
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
