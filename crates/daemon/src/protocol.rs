// SPDX-License-Identifier: MIT

//! Typed request/response payload shapes per opcode (`spec.md` §6, §9's
//! "model each opcode's request and response as a tagged union of explicit
//! shapes" design note). The opcode byte in the frame header is the tag;
//! these are just the JSON body each one carries. Unknown fields in a
//! request are ignored (forward-compatible), but missing required fields
//! fail deserialization with `BadRequest`.

use agentkernel_core::AgentId;
use serde::{Deserialize, Serialize};

pub fn parse<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, agentkernel_core::KernelError> {
    serde_json::from_slice(payload)
        .map_err(|e| agentkernel_core::KernelError::BadRequest(format!("invalid payload: {e}")))
}

// --- 0x01 THINK ---

#[derive(Debug, Deserialize)]
pub struct ThinkRequest {
    pub prompt: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub thinking_level: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub r#async: bool,
}

// --- 0x02 EXEC ---

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub cwd: Option<String>,
    pub timeout: u64,
    #[serde(default)]
    pub r#async: bool,
}

// --- 0x03/0x04 READ / WRITE ---

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub content: String,
    pub mode: String,
}

// --- 0x10-0x15 lifecycle ---

#[derive(Debug, Deserialize)]
pub struct SpawnRequest {
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub sandboxed: bool,
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub limits: crate::supervisor::Limits,
    #[serde(default = "default_restart_policy")]
    pub restart_policy: crate::supervisor::RestartPolicy,
    #[serde(default)]
    pub max_restarts: u32,
    #[serde(default)]
    pub restart_window_s: u64,
}

fn default_restart_policy() -> crate::supervisor::RestartPolicy {
    crate::supervisor::RestartPolicy::Never
}

/// `{name?|id?}` target selector used by KILL/PAUSE/RESUME.
#[derive(Debug, Deserialize, Default)]
pub struct AgentTarget {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<u32>,
}

// --- 0x20-0x23 IPC ---

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: serde_json::Value,
    #[serde(default)]
    pub to: Option<u32>,
    #[serde(default)]
    pub to_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecvRequest {
    pub max: usize,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub message: serde_json::Value,
    #[serde(default)]
    pub include_self: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

// --- 0x30-0x33 state store ---

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub key: String,
    pub value: serde_json::Value,
    pub scope: crate::state_store::Scope,
    #[serde(default)]
    pub ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct KeysRequest {
    #[serde(default)]
    pub prefix: String,
}

// --- 0x40-0x41 permissions ---

#[derive(Debug, Deserialize)]
pub struct SetPermsRequest {
    #[serde(default)]
    pub permissions: Option<agentkernel_core::Permissions>,
    #[serde(default)]
    pub level: Option<agentkernel_core::PermissionLevel>,
    #[serde(default)]
    pub agent_id: Option<u32>,
}

// --- 0x50 HTTP ---

#[derive(Debug, Deserialize)]
pub struct HttpRequest {
    pub url: String,
    pub method: crate::ops::http::Method,
    #[serde(default)]
    pub headers: Option<serde_json::Value>,
    #[serde(default)]
    pub body: Option<String>,
    pub timeout: u64,
    #[serde(default)]
    pub r#async: bool,
}

// --- 0x60-0x63 events ---

#[derive(Debug, Deserialize)]
pub struct EventTypesRequest {
    pub types: Vec<agentkernel_core::EventType>,
}

#[derive(Debug, Deserialize)]
pub struct PollEventsRequest {
    pub max: usize,
}

#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    #[serde(rename = "type")]
    pub kind: agentkernel_core::EventType,
    pub data: serde_json::Value,
}

// --- 0x70-0x76 recording / audit ---

#[derive(Debug, Deserialize, Default)]
pub struct RecordStartRequest {
    #[serde(default)]
    pub include_think: bool,
    #[serde(default)]
    pub include_http: bool,
    #[serde(default)]
    pub include_exec: bool,
    #[serde(default)]
    pub filter_agents: Vec<u32>,
    #[serde(default)]
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct RecordStatusRequest {
    #[serde(default)]
    pub export: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplayStartRequest {
    pub recording: Vec<crate::recorder::RecordedEntry>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GetAuditLogRequest {
    #[serde(default)]
    pub category: Option<agentkernel_core::AuditCategory>,
    #[serde(default)]
    pub agent_id: Option<u32>,
    #[serde(default)]
    pub since_id: Option<u64>,
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
}

fn default_audit_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct SetAuditConfigRequest {
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub log_syscalls: Option<bool>,
    #[serde(default)]
    pub log_security: Option<bool>,
}

// --- 0x80 async poll ---

#[derive(Debug, Deserialize)]
pub struct AsyncPollRequest {
    pub max: usize,
}

// --- 0xB0-0xB4 tunnel ---

#[derive(Debug, Deserialize, Default)]
pub struct TunnelParamsRequest {
    #[serde(default)]
    pub params: serde_json::Value,
}

// --- 0xF0 LLM_REPORT ---

#[derive(Debug, Deserialize)]
pub struct LlmReportRequest {
    pub tokens: u64,
    pub success: bool,
}

/// Resolves a KILL/PAUSE/RESUME target to the spawned agent's registered
/// name, which the supervisor tracks by. An explicit `id` is looked up in
/// the registry first since the wire selector allows either.
pub fn resolve_target_name(
    registry: &crate::registry::Registry,
    target: &AgentTarget,
) -> Result<String, agentkernel_core::KernelError> {
    if let Some(id) = target.id {
        let record = registry
            .get(AgentId(id))
            .ok_or_else(|| agentkernel_core::KernelError::AgentNotFound(id.to_string()))?;
        return record.name.ok_or_else(|| agentkernel_core::KernelError::AgentNotFound(id.to_string()));
    }
    if let Some(name) = &target.name {
        return Ok(name.clone());
    }
    Err(agentkernel_core::KernelError::BadRequest("expected name or id".into()))
}

#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub success: bool,
    pub error: agentkernel_core::ErrorKind,
    pub message: String,
}

impl ErrorReply {
    pub fn from(err: &agentkernel_core::KernelError) -> Self {
        Self { success: false, error: err.kind(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
