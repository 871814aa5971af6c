// SPDX-License-Identifier: MIT

//! Dispatch core (`spec.md` §4.Q): the per-request contract every opcode
//! goes through — look up the caller, check permission, invoke the
//! subsystem, record + audit, emit events, and write exactly one reply
//! frame. Each opcode has its own small `handle_*` function; [`dispatch`]
//! is just the `match` that wires them to a parsed [`Frame`].

use crate::context::KernelContext;
use crate::ops;
use crate::protocol::{self, parse, ErrorReply};
use crate::registry::AgentState;
use agentkernel_core::{AgentId, AuditCategory, EventType, KernelError, KernelEvent, PermissionLevel, Permissions};
use agentkernel_wire::Opcode;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of dispatching a single frame: the reply payload to write back,
/// and whether the connection should be closed after writing it (`EXIT`
/// only).
pub struct Dispatched {
    pub payload: Vec<u8>,
    pub close: bool,
}

fn ok_bytes(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec())
}

fn err_bytes(err: &KernelError) -> Vec<u8> {
    ok_bytes(serde_json::to_value(ErrorReply::from(err)).unwrap_or(serde_json::Value::Null))
}

fn payload_as_value(payload: &[u8]) -> serde_json::Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| serde_json::Value::String(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, payload)))
}

const REDACTED: &str = "[redacted]";

/// Masks the sensitive fields listed in `spec.md` §7 before a request's
/// parameters are written to an event or an audit entry. Field presence
/// stays visible; only the value is replaced.
fn redact_params(request: &serde_json::Value, log_prompts: bool) -> serde_json::Value {
    let mut value = request.clone();
    if let serde_json::Value::Object(map) = &mut value {
        for key in ["authorization", "cookie", "token", "environment"] {
            if let Some(slot) = map.get_mut(key) {
                *slot = serde_json::Value::String(REDACTED.into());
            }
        }
        if !log_prompts {
            for key in ["prompt", "image"] {
                if let Some(slot) = map.get_mut(key) {
                    *slot = serde_json::Value::String(REDACTED.into());
                }
            }
        }
    }
    value
}

/// Merges `extra`'s keys into `base` without overwriting a key `base`
/// already set (e.g. `opcode`, `reason`). No-op unless both are objects.
fn merge_params(base: &mut serde_json::Value, extra: &serde_json::Value) {
    if let (serde_json::Value::Object(base_map), serde_json::Value::Object(extra_map)) = (base, extra) {
        for (k, v) in extra_map {
            base_map.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

/// Maps an opcode (and whether the call was denied) to the audit category
/// it is logged under. A permission denial is always `Security` regardless
/// of which opcode triggered it (`spec.md` §4.E).
fn audit_category(opcode: Opcode, denied: bool) -> AuditCategory {
    if denied {
        return AuditCategory::Security;
    }
    use agentkernel_wire::OpcodeCategory::*;
    match opcode.category() {
        Lifecycle => AuditCategory::AgentLifecycle,
        Ipc => AuditCategory::Ipc,
        State => AuditCategory::State,
        Http => AuditCategory::Network,
        Tunnel => AuditCategory::Network,
        _ => AuditCategory::Syscall,
    }
}

/// Dispatch a single received frame for an already-registered agent.
/// Never panics: a handler error becomes an error reply, not a dropped
/// connection (frame-level errors are handled separately by the
/// transport, before this function is ever called).
pub async fn dispatch(ctx: &Arc<KernelContext>, agent_id: AgentId, opcode_byte: u8, payload: Vec<u8>) -> Dispatched {
    let now = ctx.clock.epoch_ms();

    let opcode = match Opcode::try_from(opcode_byte) {
        Ok(op) => op,
        Err(byte) => {
            let err = KernelError::Unsupported;
            ctx.audit.append(
                AuditCategory::Syscall,
                Some(agent_id),
                format!("unsupported opcode 0x{byte:02x}"),
                serde_json::Value::Null,
                now,
            );
            return Dispatched { payload: err_bytes(&err), close: false };
        }
    };

    // NOOP is the one opcode that is not JSON in, JSON out: the payload is
    // echoed byte-for-byte (`spec.md` §6 HELLO/NOOP handshake note).
    if opcode == Opcode::Noop {
        return Dispatched { payload, close: false };
    }

    let Some(record) = ctx.registry.get(agent_id) else {
        let err = KernelError::Internal("dispatch called for an unregistered agent".into());
        return Dispatched { payload: err_bytes(&err), close: false };
    };
    let perms = record.permissions.clone();

    let request_value = payload_as_value(&payload);
    ctx.bump_syscall_count(agent_id);

    let result = route(ctx, agent_id, &perms, opcode, &payload, now).await;

    let denied = matches!(result, Err(KernelError::PermissionDenied(_)));
    // `spec.md` §4.E requires the denial event/audit entry to carry the
    // attempted operation's parameters (redacted), not just its opcode.
    let denied_params = if denied { redact_params(&request_value, ctx.audit.config().log_syscalls) } else { serde_json::Value::Null };

    if denied && ctx.events.is_subscribed(agent_id, EventType::SyscallBlocked) {
        let mut data = serde_json::json!({ "opcode": opcode.name(), "reason": result.as_ref().err().map(|e| e.to_string()) });
        merge_params(&mut data, &denied_params);
        ctx.events.publish_to(agent_id, KernelEvent::new(EventType::SyscallBlocked, data, now));
    }

    let (reply_value, success) = match &result {
        Ok(v) => (v.clone(), true),
        Err(e) => (serde_json::to_value(ErrorReply::from(e)).unwrap_or(serde_json::Value::Null), false),
    };

    let mut audit_details = serde_json::json!({ "opcode": opcode.name() });
    if denied {
        merge_params(&mut audit_details, &denied_params);
    }
    ctx.audit.append(
        audit_category(opcode, denied),
        Some(agent_id),
        format!("{} {}", opcode.name(), if success { "ok" } else { "failed" }),
        audit_details,
        now,
    );
    ctx.recorder.observe(agent_id, opcode, request_value, reply_value.clone(), success);

    Dispatched { payload: ok_bytes(reply_value), close: opcode == Opcode::Exit }
}

async fn route(
    ctx: &Arc<KernelContext>,
    agent_id: AgentId,
    perms: &Permissions,
    opcode: Opcode,
    payload: &[u8],
    now: u64,
) -> Result<serde_json::Value, KernelError> {
    match opcode {
        // Handled by `dispatch` before `route` is ever reached; kept here
        // only so this match stays exhaustive over every `Opcode` variant.
        Opcode::Noop => Ok(serde_json::json!({ "success": true })),
        Opcode::Hello => handle_hello(ctx, agent_id, now),
        Opcode::Exit => {
            ctx.shutdown.notify_waiters();
            Ok(serde_json::json!({ "success": true }))
        }

        Opcode::Think => handle_think(payload).await,
        Opcode::Exec => handle_exec(ctx, agent_id, perms, payload, now).await,
        Opcode::Read => handle_read(perms, payload).await,
        Opcode::Write => handle_write(perms, payload).await,

        Opcode::Spawn => handle_spawn(ctx, perms, payload).await,
        Opcode::Kill => handle_kill(ctx, perms, payload).await,
        Opcode::List => handle_list(ctx),
        Opcode::Pause => handle_pause(ctx, perms, payload),
        Opcode::Resume => handle_resume(ctx, perms, payload),

        Opcode::Send => handle_send(ctx, agent_id, payload, now),
        Opcode::Recv => handle_recv(ctx, agent_id, payload, now),
        Opcode::Broadcast => handle_broadcast(ctx, agent_id, payload, now),
        Opcode::Register => handle_register(ctx, agent_id, payload),

        Opcode::Store => handle_store(ctx, agent_id, payload, now),
        Opcode::Fetch => handle_fetch(ctx, agent_id, payload, now),
        Opcode::Delete => handle_delete(ctx, agent_id, payload, now),
        Opcode::Keys => handle_keys(ctx, agent_id, payload),

        Opcode::GetPerms => handle_get_perms(perms),
        Opcode::SetPerms => handle_set_perms(ctx, agent_id, perms, payload),

        Opcode::Http => handle_http(ctx, agent_id, perms, payload, now).await,

        Opcode::Subscribe => handle_subscribe(ctx, agent_id, payload),
        Opcode::Unsubscribe => handle_unsubscribe(ctx, agent_id, payload),
        Opcode::PollEvents => handle_poll_events(ctx, agent_id, payload),
        Opcode::Emit => handle_emit(ctx, agent_id, payload, now),

        Opcode::RecordStart => handle_record_start(ctx, payload),
        Opcode::RecordStop => handle_record_stop(ctx),
        Opcode::RecordStatus => handle_record_status(ctx, payload),
        Opcode::ReplayStart => handle_replay_start(ctx, agent_id, payload, now).await,
        Opcode::ReplayStatus => handle_replay_status(ctx),
        Opcode::GetAuditLog => handle_get_audit_log(ctx, payload),
        Opcode::SetAuditConfig => handle_set_audit_config(ctx, payload),

        Opcode::AsyncPoll => handle_async_poll(ctx, agent_id, payload),

        Opcode::TunnelConnect => handle_tunnel(ctx, payload, TunnelOp::Connect).await,
        Opcode::TunnelDisconnect => handle_tunnel(ctx, payload, TunnelOp::Disconnect).await,
        Opcode::TunnelStatus => handle_tunnel(ctx, payload, TunnelOp::Status).await,
        Opcode::TunnelListRemotes => handle_tunnel(ctx, payload, TunnelOp::ListRemotes).await,
        Opcode::TunnelConfig => handle_tunnel(ctx, payload, TunnelOp::Config).await,

        Opcode::MetricsSystem => Ok(serde_json::json!({ "success": true, "metrics": ctx.metrics.system() })),
        Opcode::MetricsAgent => handle_metrics_agent(ctx, agent_id, payload),
        Opcode::MetricsCgroup => Ok(serde_json::json!({ "success": true, "counters": ctx.metrics.cgroup() })),

        Opcode::LlmReport => handle_llm_report(ctx, agent_id, payload, now),
    }
}

fn handle_hello(ctx: &Arc<KernelContext>, agent_id: AgentId, now: u64) -> Result<serde_json::Value, KernelError> {
    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": agentkernel_wire::ALL_OPCODES.iter().map(|op| op.name()).collect::<Vec<_>>(),
        "agent_id": agent_id.0,
        "uptime": now.saturating_sub(ctx.boot_epoch_ms),
    }))
}

async fn handle_think(payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::ThinkRequest = parse(payload)?;
    let result = ops::think::think(&req.prompt, req.model.as_deref()).await?;
    Ok(serde_json::to_value(result).unwrap_or(serde_json::Value::Null))
}

async fn handle_exec(
    ctx: &Arc<KernelContext>,
    agent_id: AgentId,
    perms: &Permissions,
    payload: &[u8],
    now: u64,
) -> Result<serde_json::Value, KernelError> {
    let req: protocol::ExecRequest = parse(payload)?;
    let tokens = ops::exec::tokenize_command(&req.command)?;
    crate::perm_engine::check_exec(perms, &tokens[0])?;
    let timeout_ms = req.timeout.min(perms.max_exec_time_ms.max(1));
    let cwd = req.cwd.as_deref().map(std::path::Path::new);
    let timeout = Duration::from_millis(timeout_ms);

    if req.r#async {
        let request_id = nanoid::nanoid!();
        ctx.async_queue.begin(agent_id, request_id.clone());
        let command = req.command.clone();
        let cwd = req.cwd.clone();
        let queue = Arc::clone(&ctx.async_queue);
        let rid = request_id.clone();
        tokio::spawn(async move {
            let cwd_path = cwd.as_deref().map(std::path::Path::new);
            let outcome = ops::exec::run(&command, cwd_path, timeout, &[]).await;
            let (success, value, error) = match outcome {
                Ok(r) => (r.success, serde_json::to_value(r).unwrap_or(serde_json::Value::Null), None),
                Err(e) => (false, serde_json::Value::Null, Some(e.to_string())),
            };
            queue.complete(crate::async_queue::AsyncResult {
                request_id: rid,
                agent_id,
                opcode: Opcode::Exec as u8,
                success,
                value,
                error,
            });
        });
        return Ok(serde_json::json!({ "success": true, "request_id": request_id }));
    }

    let _ = now;
    let result = ops::exec::run(&req.command, cwd, timeout, &[]).await?;
    Ok(serde_json::to_value(result).unwrap_or(serde_json::Value::Null))
}

async fn handle_read(perms: &Permissions, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::ReadRequest = parse(payload)?;
    let path = crate::perm_engine::check_read_path(perms, &req.path)?;
    let result = ops::fs::read_file(&path).await?;
    Ok(serde_json::to_value(result).unwrap_or(serde_json::Value::Null))
}

async fn handle_write(perms: &Permissions, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::WriteRequest = parse(payload)?;
    let path = crate::perm_engine::check_write_path(perms, &req.path)?;
    let mode = match req.mode.as_str() {
        "append" => ops::fs::WriteMode::Append,
        _ => ops::fs::WriteMode::Write,
    };
    let result = ops::fs::write_file(&path, &req.content, mode).await?;
    Ok(serde_json::to_value(result).unwrap_or(serde_json::Value::Null))
}

async fn handle_spawn(ctx: &Arc<KernelContext>, perms: &Permissions, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    crate::perm_engine::check_level_at_least(perms, PermissionLevel::Standard)?;
    let req: protocol::SpawnRequest = parse(payload)?;
    let spawn_request = crate::supervisor::SpawnRequest {
        name: req.name,
        script: req.script,
        sandboxed: req.sandboxed,
        network: req.network,
        limits: req.limits,
        restart_policy: req.restart_policy,
        max_restarts: req.max_restarts,
        restart_window_s: req.restart_window_s,
    };
    let (id, pid) = ctx.supervisor.spawn(spawn_request).await?;
    Ok(serde_json::json!({ "success": true, "id": id.0, "pid": pid, "status": "running" }))
}

async fn handle_kill(ctx: &Arc<KernelContext>, perms: &Permissions, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    crate::perm_engine::check_level_at_least(perms, PermissionLevel::Standard)?;
    let target: protocol::AgentTarget = parse(payload)?;
    let name = protocol::resolve_target_name(&ctx.registry, &target)?;
    ctx.supervisor.kill(&name).await?;
    Ok(serde_json::json!({ "success": true, "killed": true }))
}

fn handle_list(ctx: &Arc<KernelContext>) -> Result<serde_json::Value, KernelError> {
    let agents: Vec<serde_json::Value> = ctx
        .registry
        .list()
        .into_iter()
        .map(|a| {
            serde_json::json!({
                "id": a.id.0,
                "name": a.name,
                "pid": a.pid,
                "state": a.state,
                "registered_at": a.registered_at,
            })
        })
        .collect();
    Ok(serde_json::json!({ "success": true, "agents": agents }))
}

fn handle_pause(ctx: &Arc<KernelContext>, perms: &Permissions, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    crate::perm_engine::check_level_at_least(perms, PermissionLevel::Standard)?;
    let target: protocol::AgentTarget = parse(payload)?;
    let name = protocol::resolve_target_name(&ctx.registry, &target)?;
    ctx.supervisor.pause(&name)?;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_resume(ctx: &Arc<KernelContext>, perms: &Permissions, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    crate::perm_engine::check_level_at_least(perms, PermissionLevel::Standard)?;
    let target: protocol::AgentTarget = parse(payload)?;
    let name = protocol::resolve_target_name(&ctx.registry, &target)?;
    ctx.supervisor.resume(&name)?;
    Ok(serde_json::json!({ "success": true }))
}

fn resolve_ipc_target(ctx: &Arc<KernelContext>, to: Option<u32>, to_name: Option<&str>) -> Result<AgentId, KernelError> {
    if let Some(id) = to {
        return Ok(AgentId(id));
    }
    if let Some(name) = to_name {
        return ctx.registry.resolve(name).ok_or_else(|| KernelError::AgentNotFound(name.to_string()));
    }
    Err(KernelError::BadRequest("expected to or to_name".into()))
}

fn handle_send(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::SendRequest = parse(payload)?;
    let to = resolve_ipc_target(ctx, req.to, req.to_name.as_deref())?;
    let from_name = ctx.registry.get(agent_id).and_then(|a| a.name);
    let message = crate::ipc::IpcMessage { from: agent_id, from_name, message: req.message, enqueued_at: now };
    let outcome = ctx.mailboxes.send(to, message);

    if outcome.became_non_empty {
        ctx.events.publish(KernelEvent::new(EventType::MessageReceived, serde_json::json!({ "agent_id": to.0 }), now));
    }
    if outcome.dropped_oldest && ctx.events.is_subscribed(to, EventType::ResourceWarning) {
        ctx.events.publish_to(
            to,
            KernelEvent::new(EventType::ResourceWarning, serde_json::json!({ "reason": "ipc_overflow", "agent_id": to.0 }), now),
        );
    }
    Ok(serde_json::json!({ "success": true, "delivered_to": to.0 }))
}

fn handle_recv(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::RecvRequest = parse(payload)?;
    let messages = ctx.mailboxes.recv(agent_id, req.max, now);
    let out: Vec<serde_json::Value> = messages
        .into_iter()
        .map(|(m, age_ms)| serde_json::json!({ "from": m.from.0, "from_name": m.from_name, "message": m.message, "age_ms": age_ms }))
        .collect();
    let count = out.len();
    Ok(serde_json::json!({ "success": true, "messages": out, "count": count }))
}

fn handle_broadcast(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::BroadcastRequest = parse(payload)?;
    let from_name = ctx.registry.get(agent_id).and_then(|a| a.name);
    let mut delivered = 0u32;
    for record in ctx.registry.list() {
        if record.name.is_none() || record.state != AgentState::Running {
            continue;
        }
        if record.id == agent_id && !req.include_self {
            continue;
        }
        let message =
            crate::ipc::IpcMessage { from: agent_id, from_name: from_name.clone(), message: req.message.clone(), enqueued_at: now };
        let outcome = ctx.mailboxes.send(record.id, message);
        if outcome.became_non_empty {
            ctx.events.publish(KernelEvent::new(EventType::MessageReceived, serde_json::json!({ "agent_id": record.id.0 }), now));
        }
        delivered += 1;
    }
    Ok(serde_json::json!({ "success": true, "delivered_count": delivered }))
}

fn handle_register(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::RegisterRequest = parse(payload)?;
    ctx.registry.register_name(agent_id, req.name.clone())?;
    Ok(serde_json::json!({ "success": true, "agent_id": agent_id.0, "name": req.name }))
}

fn handle_store(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::StoreRequest = parse(payload)?;
    ctx.state.store(agent_id, req.key.clone(), req.value, req.scope, req.ttl, now);
    ctx.events.publish(
        KernelEvent::new(EventType::StateChanged, serde_json::json!({ "op": "set", "key": req.key, "scope": req.scope }), now)
            .with_source(agent_id),
    );
    Ok(serde_json::json!({ "success": true, "key": req.key }))
}

fn handle_fetch(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::FetchRequest = parse(payload)?;
    match ctx.state.fetch(agent_id, &req.key, now) {
        Some((value, scope)) => Ok(serde_json::json!({ "success": true, "exists": true, "value": value, "scope": scope })),
        None => Ok(serde_json::json!({ "success": true, "exists": false, "value": serde_json::Value::Null, "scope": serde_json::Value::Null })),
    }
}

fn handle_delete(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::DeleteRequest = parse(payload)?;
    let deleted = ctx.state.delete(agent_id, &req.key);
    if deleted {
        ctx.events.publish(
            KernelEvent::new(EventType::StateChanged, serde_json::json!({ "op": "delete", "key": req.key }), now)
                .with_source(agent_id),
        );
    }
    Ok(serde_json::json!({ "success": true, "deleted": deleted }))
}

fn handle_keys(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::KeysRequest = parse(payload)?;
    let keys = ctx.state.list_keys(agent_id, &req.prefix);
    Ok(serde_json::json!({ "success": true, "count": keys.len(), "keys": keys }))
}

fn handle_get_perms(perms: &Permissions) -> Result<serde_json::Value, KernelError> {
    Ok(serde_json::json!({
        "success": true,
        "level": perms.level,
        "paths": perms.paths,
        "commands": perms.commands,
        "domains": perms.domains,
        "exec_enabled": perms.exec_enabled,
        "max_exec_time_ms": perms.max_exec_time_ms,
        "network_enabled": perms.network_enabled,
    }))
}

fn handle_set_perms(
    ctx: &Arc<KernelContext>,
    agent_id: AgentId,
    perms: &Permissions,
    payload: &[u8],
) -> Result<serde_json::Value, KernelError> {
    crate::perm_engine::check_level_at_least(perms, PermissionLevel::Standard)?;
    let req: protocol::SetPermsRequest = parse(payload)?;
    let target = req.agent_id.map(AgentId).unwrap_or(agent_id);
    if target != agent_id {
        crate::perm_engine::check_level_at_least(perms, PermissionLevel::Unrestricted)?;
    }
    let new_perms = match req.permissions {
        Some(p) => p,
        None => Permissions::preset(req.level.ok_or_else(|| KernelError::BadRequest("expected permissions or level".into()))?),
    };
    ctx.registry.get(target).ok_or_else(|| KernelError::AgentNotFound(target.0.to_string()))?;
    ctx.registry.set_permissions(target, new_perms);
    Ok(serde_json::json!({ "success": true, "agent_id": target.0 }))
}

async fn handle_http(
    ctx: &Arc<KernelContext>,
    agent_id: AgentId,
    perms: &Permissions,
    payload: &[u8],
    now: u64,
) -> Result<serde_json::Value, KernelError> {
    let req: protocol::HttpRequest = parse(payload)?;
    if !perms.network_enabled {
        return Err(KernelError::PermissionDenied("network disabled".into()));
    }
    let timeout = Duration::from_millis(req.timeout);
    let perms_arc = Arc::new(perms.clone());

    if req.r#async {
        let request_id = nanoid::nanoid!();
        ctx.async_queue.begin(agent_id, request_id.clone());
        let url = req.url.clone();
        let method = req.method;
        let headers = req.headers.clone();
        let body = req.body.clone();
        let queue = Arc::clone(&ctx.async_queue);
        let rid = request_id.clone();
        tokio::spawn(async move {
            let outcome = ops::http::request(perms_arc, &url, method, headers, body, timeout).await;
            let (success, value, error) = match outcome {
                Ok(r) => (r.success, serde_json::to_value(r).unwrap_or(serde_json::Value::Null), None),
                Err(e) => (false, serde_json::Value::Null, Some(e.to_string())),
            };
            queue.complete(crate::async_queue::AsyncResult {
                request_id: rid,
                agent_id,
                opcode: Opcode::Http as u8,
                success,
                value,
                error,
            });
        });
        return Ok(serde_json::json!({ "success": true, "request_id": request_id }));
    }

    let _ = now;
    let result = ops::http::request(perms_arc, &req.url, req.method, req.headers, req.body, timeout).await?;
    Ok(serde_json::to_value(result).unwrap_or(serde_json::Value::Null))
}

fn handle_subscribe(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::EventTypesRequest = parse(payload)?;
    ctx.events.subscribe(agent_id, &req.types);
    Ok(serde_json::json!({ "success": true }))
}

fn handle_unsubscribe(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::EventTypesRequest = parse(payload)?;
    ctx.events.unsubscribe(agent_id, &req.types);
    Ok(serde_json::json!({ "success": true }))
}

fn handle_poll_events(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::PollEventsRequest = parse(payload)?;
    let events = ctx.events.poll(agent_id, req.max);
    Ok(serde_json::json!({ "success": true, "count": events.len(), "events": events }))
}

fn handle_emit(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::EmitRequest = parse(payload)?;
    ctx.events.emit(agent_id, req.kind, req.data, now)?;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_record_start(ctx: &Arc<KernelContext>, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::RecordStartRequest = parse(payload)?;
    ctx.recorder.start(crate::recorder::RecordOptions {
        include_think: req.include_think,
        include_http: req.include_http,
        include_exec: req.include_exec,
        filter_agents: req.filter_agents.into_iter().map(AgentId).collect(),
        max_entries: req.max_entries,
    });
    Ok(serde_json::json!({ "success": true }))
}

fn handle_record_stop(ctx: &Arc<KernelContext>) -> Result<serde_json::Value, KernelError> {
    let count = ctx.recorder.stop();
    Ok(serde_json::json!({ "success": true, "count": count }))
}

fn handle_record_status(ctx: &Arc<KernelContext>, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::RecordStatusRequest = parse(payload)?;
    let mut reply = serde_json::json!({ "success": true, "recording": ctx.recorder.is_recording() });
    if req.export {
        reply["recording_data"] = serde_json::to_value(ctx.recorder.export()).unwrap_or(serde_json::Value::Null);
    }
    Ok(reply)
}

/// Replays a previously-exported recording synchronously against the live
/// kernel: every entry not marked `skip_on_replay` is re-dispatched as the
/// replaying agent, and its fresh reply bytes are compared against the
/// recorded ones (`spec.md` §4.M, §8 scenario S6).
async fn handle_replay_start(
    ctx: &Arc<KernelContext>,
    agent_id: AgentId,
    payload: &[u8],
    now: u64,
) -> Result<serde_json::Value, KernelError> {
    let req: protocol::ReplayStartRequest = parse(payload)?;
    let mut replayed = 0u32;
    let mut skipped = 0u32;
    let mut mismatches: Vec<serde_json::Value> = Vec::new();

    for entry in &req.recording {
        if entry.skip_on_replay {
            skipped += 1;
            continue;
        }
        let request_bytes = serde_json::to_vec(&entry.request).unwrap_or_default();
        let outcome = Box::pin(dispatch(ctx, agent_id, entry.opcode, request_bytes)).await;
        let replayed_value: serde_json::Value = serde_json::from_slice(&outcome.payload).unwrap_or(serde_json::Value::Null);
        replayed += 1;
        if replayed_value != entry.response {
            mismatches.push(serde_json::json!({ "seq": entry.seq, "expected": entry.response, "actual": replayed_value }));
        }
    }

    let status = serde_json::json!({
        "success": true,
        "replayed": replayed,
        "skipped": skipped,
        "mismatches": mismatches,
        "completed_at": now,
    });
    *ctx.replay_status.lock() = Some(status.clone());
    Ok(status)
}

fn handle_replay_status(ctx: &Arc<KernelContext>) -> Result<serde_json::Value, KernelError> {
    match ctx.replay_status.lock().clone() {
        Some(status) => Ok(status),
        None => Ok(serde_json::json!({ "success": true, "replayed": 0, "skipped": 0, "mismatches": [] })),
    }
}

fn handle_get_audit_log(ctx: &Arc<KernelContext>, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::GetAuditLogRequest = parse(payload)?;
    let entries = ctx.audit.query(req.category, req.agent_id.map(AgentId), req.since_id, req.limit);
    Ok(serde_json::json!({ "success": true, "entries": entries }))
}

fn handle_set_audit_config(ctx: &Arc<KernelContext>, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::SetAuditConfigRequest = parse(payload)?;
    let mut config = ctx.audit.config();
    if let Some(max_entries) = req.max_entries {
        config.max_entries = max_entries;
    }
    if let Some(log_syscalls) = req.log_syscalls {
        config.log_syscalls = log_syscalls;
    }
    if let Some(log_security) = req.log_security {
        config.log_security = log_security;
    }
    ctx.audit.set_config(config);
    Ok(serde_json::json!({ "success": true }))
}

fn handle_async_poll(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    let req: protocol::AsyncPollRequest = parse(payload)?;
    let results = ctx.async_queue.poll(agent_id, req.max);
    Ok(serde_json::json!({ "success": true, "count": results.len(), "results": results }))
}

enum TunnelOp {
    Connect,
    Disconnect,
    Status,
    ListRemotes,
    Config,
}

async fn handle_tunnel(ctx: &Arc<KernelContext>, payload: &[u8], op: TunnelOp) -> Result<serde_json::Value, KernelError> {
    let bridge = ctx.tunnel.lock().clone().ok_or_else(|| KernelError::Tunnel("no tunnel helper configured".into()))?;
    let req: protocol::TunnelParamsRequest = if payload.is_empty() { Default::default() } else { parse(payload)? };
    let result = match op {
        TunnelOp::Connect => bridge.connect(req.params).await?,
        TunnelOp::Disconnect => bridge.disconnect(req.params).await?,
        TunnelOp::Status => bridge.status().await?,
        TunnelOp::ListRemotes => bridge.list_remotes().await?,
        TunnelOp::Config => bridge.config(req.params).await?,
    };
    Ok(serde_json::json!({ "success": true, "result": result }))
}

fn handle_metrics_agent(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8]) -> Result<serde_json::Value, KernelError> {
    #[derive(serde::Deserialize, Default)]
    struct Req {
        #[serde(default)]
        agent_id: Option<u32>,
    }
    let req: Req = if payload.is_empty() { Req::default() } else { parse(payload)? };
    let target = req.agent_id.map(AgentId).unwrap_or(agent_id);
    let record = ctx.registry.get(target).ok_or_else(|| KernelError::AgentNotFound(target.0.to_string()))?;
    let pid = record.pid.ok_or_else(|| KernelError::AgentNotFound(format!("{target} has no OS process")))?;
    let syscall_count = *ctx.syscall_counts.lock().get(&target).unwrap_or(&0);
    let uptime_secs = ctx.clock.epoch_ms().saturating_sub(record.registered_at) / 1000;
    let metrics = ctx.metrics.agent(pid, syscall_count, uptime_secs).ok_or_else(|| KernelError::AgentNotFound(format!("{target} process not found")))?;
    Ok(serde_json::json!({ "success": true, "metrics": metrics }))
}

fn handle_llm_report(ctx: &Arc<KernelContext>, agent_id: AgentId, payload: &[u8], now: u64) -> Result<serde_json::Value, KernelError> {
    let req: protocol::LlmReportRequest = parse(payload)?;
    ctx.audit.append(
        AuditCategory::Syscall,
        Some(agent_id),
        "llm_report",
        serde_json::json!({ "tokens": req.tokens, "success": req.success }),
        now,
    );
    Ok(serde_json::json!({ "success": true }))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
