// SPDX-License-Identifier: MIT

//! Tunnel bridge (`spec.md` §4.P): an optional helper subprocess that
//! speaks line-delimited JSON over its stdio and relays syscalls from a
//! remote peer. Absent unless `--tunnel-helper <path>` is configured; the
//! five `tunnel_*` opcodes reply with `KernelError::Tunnel` when no helper
//! is running.

use agentkernel_core::{AgentId, EventType, KernelError, KernelEvent, Permissions};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, oneshot};

use crate::events::EventBus;
use crate::registry::Registry;

const REQUEST_TIMEOUT_S: u64 = 30;

/// First id handed to a remote agent synthesized from the helper's
/// `agent_connected` event, kept out of the local `IdAllocator`'s range.
const REMOTE_ID_BASE: u32 = 1000;

#[derive(Debug, Serialize)]
struct HelperRequest<'a> {
    id: String,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct HelperLine {
    id: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    event: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// A `syscall` event relayed by the helper on behalf of a remote agent,
/// queued for the dispatch core to handle as if from a local connection.
#[derive(Debug)]
pub struct RemoteSyscall {
    pub helper_request_id: String,
    pub agent_id: AgentId,
    pub opcode: String,
    pub params: serde_json::Value,
}

type PendingMap = HashMap<String, oneshot::Sender<Result<serde_json::Value, String>>>;

pub struct TunnelBridge {
    child: Mutex<Child>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Mutex<PendingMap>,
    next_request_id: AtomicU64,
    next_remote_id: AtomicU32,
    syscalls_tx: mpsc::UnboundedSender<RemoteSyscall>,
    syscalls_rx: Mutex<mpsc::UnboundedReceiver<RemoteSyscall>>,
    registry: Arc<Registry>,
    events: Arc<EventBus>,
}

impl TunnelBridge {
    /// Spawns the helper and starts its stdout reader task. Returns an
    /// `Arc` since the reader task and every caller share ownership.
    pub fn spawn(
        helper_path: &Path,
        registry: Arc<Registry>,
        events: Arc<EventBus>,
    ) -> Result<Arc<Self>, KernelError> {
        let mut child = tokio::process::Command::new(helper_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| KernelError::Tunnel(format!("failed to spawn helper: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| KernelError::Tunnel("helper child has no piped stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| KernelError::Tunnel("helper child has no piped stdout".into()))?;
        let (syscalls_tx, syscalls_rx) = mpsc::unbounded_channel();

        let bridge = Arc::new(Self {
            child: Mutex::new(child),
            stdin: tokio::sync::Mutex::new(stdin),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
            next_remote_id: AtomicU32::new(REMOTE_ID_BASE),
            syscalls_tx,
            syscalls_rx: Mutex::new(syscalls_rx),
            registry,
            events,
        });

        let reader_bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => reader_bridge.handle_line(&line),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "tunnel helper stdout read failed");
                        break;
                    }
                }
            }
        });

        Ok(bridge)
    }

    fn handle_line(&self, line: &str) {
        let parsed: HelperLine = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, line, "unparseable tunnel helper line");
                return;
            }
        };

        if let Some(id) = &parsed.id {
            if parsed.event.is_none() {
                let sender = self.pending.lock().remove(id);
                if let Some(sender) = sender {
                    let outcome = match parsed.error {
                        Some(err) => Err(err),
                        None => Ok(parsed.result.unwrap_or(serde_json::Value::Null)),
                    };
                    let _ = sender.send(outcome);
                }
                return;
            }
        }

        match parsed.event.as_deref() {
            Some("agent_connected") => self.on_agent_connected(parsed.data),
            Some("syscall") => self.on_syscall(parsed.id, parsed.data),
            Some(other) => tracing::debug!(event = other, "unhandled tunnel helper event"),
            None => {}
        }
    }

    fn on_agent_connected(&self, data: serde_json::Value) {
        let id = AgentId(self.next_remote_id.fetch_add(1, Ordering::Relaxed));
        let permissions = Permissions::preset(agentkernel_core::PermissionLevel::Sandboxed);
        self.registry.insert_remote(id, 0, permissions);
        self.events.publish(KernelEvent::new(
            EventType::AgentSpawned,
            serde_json::json!({"remote": true, "agent_id": id.0, "helper_data": data}),
            0,
        ));
    }

    fn on_syscall(&self, helper_request_id: Option<String>, data: serde_json::Value) {
        let Some(helper_request_id) = helper_request_id else {
            tracing::warn!("tunnel syscall event missing an id, cannot reply");
            return;
        };
        let Some(agent_id) = data.get("agent_id").and_then(|v| v.as_u64()) else {
            tracing::warn!("tunnel syscall event missing agent_id");
            return;
        };
        let Some(opcode) = data.get("opcode").and_then(|v| v.as_str()) else {
            tracing::warn!("tunnel syscall event missing opcode");
            return;
        };
        let params = data.get("params").cloned().unwrap_or(serde_json::Value::Null);
        let _ = self.syscalls_tx.send(RemoteSyscall {
            helper_request_id,
            agent_id: AgentId(agent_id as u32),
            opcode: opcode.to_string(),
            params,
        });
    }

    /// Pulls the next relayed syscall for the dispatch core to process;
    /// the reply must be returned via [`TunnelBridge::send_response`].
    pub async fn next_remote_syscall(&self) -> Option<RemoteSyscall> {
        self.syscalls_rx.lock().recv().await
    }

    /// Sends a dispatch reply for a previously-received [`RemoteSyscall`]
    /// back through the helper as `{"id", "result"|"error"}`.
    pub async fn send_response(
        &self,
        helper_request_id: String,
        outcome: Result<serde_json::Value, String>,
    ) -> Result<(), KernelError> {
        let (result, error) = match outcome {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e)),
        };
        let line = serde_json::json!({"id": helper_request_id, "result": result, "error": error});
        self.write_line(&line).await
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, KernelError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);

        let request = HelperRequest { id: id.clone(), method, params };
        if let Err(e) = self.write_line(&request).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_S), rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(KernelError::Tunnel(err)),
            Ok(Err(_canceled)) => Err(KernelError::Tunnel("helper closed the channel".into())),
            Err(_elapsed) => {
                self.pending.lock().remove(&id);
                Err(KernelError::Timeout)
            }
        }
    }

    async fn write_line(&self, value: &impl Serialize) -> Result<(), KernelError> {
        let mut line = serde_json::to_string(value)
            .map_err(|e| KernelError::Tunnel(format!("failed to encode helper request: {e}")))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        tokio_write_line(&mut stdin, &line).await
    }

    pub async fn connect(&self, params: serde_json::Value) -> Result<serde_json::Value, KernelError> {
        self.call("connect", params).await
    }

    pub async fn disconnect(&self, params: serde_json::Value) -> Result<serde_json::Value, KernelError> {
        self.call("disconnect", params).await
    }

    pub async fn status(&self) -> Result<serde_json::Value, KernelError> {
        self.call("status", serde_json::Value::Null).await
    }

    pub async fn list_remotes(&self) -> Result<serde_json::Value, KernelError> {
        self.call("list_remotes", serde_json::Value::Null).await
    }

    pub async fn config(&self, params: serde_json::Value) -> Result<serde_json::Value, KernelError> {
        self.call("config", params).await
    }

    pub async fn shutdown(&self) {
        let mut child = self.child.lock();
        let _ = child.start_kill();
    }
}

async fn tokio_write_line(stdin: &mut ChildStdin, line: &str) -> Result<(), KernelError> {
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| KernelError::Tunnel(format!("failed to write to helper: {e}")))
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;
