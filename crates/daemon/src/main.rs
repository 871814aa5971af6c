// SPDX-License-Identifier: MIT

//! `agentkerneld`: the agent microkernel binary. Parses `KernelConfig`,
//! wires up the kernel context, binds the transport, and serves until a
//! client sends `EXIT` or the process receives a shutdown signal.
//!
//! Exit codes (`spec.md` §6 CLI surface):
//! - `0` clean exit
//! - `1` fatal configuration error
//! - `2` socket bind failure
//! - `3` unreachable supervisor dependencies

use agentkernel_core::{Clock, SystemClock};
use agentkernel_daemon::config::KernelConfig;
use agentkernel_daemon::context::KernelContext;
use agentkernel_daemon::dispatch::dispatch;
use agentkernel_daemon::transport::Transport;
use agentkernel_daemon::tunnel::TunnelBridge;
use agentkernel_wire::Opcode;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = KernelConfig::parse();

    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = validate_config(&config) {
        error!(error = %e, "fatal configuration error");
        return ExitCode::from(1);
    }

    if which("sh").is_none() {
        error!("sh not found on PATH: the process supervisor cannot launch any agent");
        return ExitCode::from(3);
    }

    let ctx = KernelContext::new(Arc::new(config), Arc::new(SystemClock));
    ctx.audit.set_config(agentkernel_daemon::audit::AuditConfig {
        max_entries: ctx.config.audit_max_entries,
        log_syscalls: true,
        log_security: true,
    });

    if let Some(helper_path) = &ctx.config.tunnel_helper {
        match TunnelBridge::spawn(helper_path, Arc::clone(&ctx.registry), Arc::clone(&ctx.events)) {
            Ok(bridge) => {
                tokio::spawn(relay_remote_syscalls(Arc::clone(&ctx), Arc::clone(&bridge)));
                *ctx.tunnel.lock() = Some(bridge);
            }
            Err(e) => {
                error!(error = %e, "failed to spawn tunnel helper, continuing without it");
            }
        }
    }

    spawn_sweeper(Arc::clone(&ctx));

    let transport = match Transport::bind(Arc::clone(&ctx)).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, socket = %ctx.config.socket_path, "failed to bind transport");
            return ExitCode::from(2);
        }
    };

    info!(socket = %ctx.config.socket_path, "agentkerneld listening");
    transport.run().await;

    ExitCode::SUCCESS
}

fn validate_config(config: &KernelConfig) -> Result<(), String> {
    if config.tcp_addr.is_some() && config.auth_token.is_none() {
        return Err("--tcp-addr requires --auth-token".into());
    }
    if let Some(helper) = &config.tunnel_helper {
        if !helper.is_file() {
            return Err(format!("tunnel helper not found: {}", helper.display()));
        }
    }
    Ok(())
}

fn which(program: &str) -> Option<std::path::PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).map(|dir| dir.join(program)).find(|p| p.is_file())
    })
}

/// Drains syscalls the tunnel helper relays on behalf of a remote agent,
/// runs each through the same dispatch core a local connection uses, and
/// returns the reply to the helper (`spec.md` §4.P's core contract).
async fn relay_remote_syscalls(ctx: Arc<KernelContext>, bridge: Arc<agentkernel_daemon::tunnel::TunnelBridge>) {
    while let Some(syscall) = bridge.next_remote_syscall().await {
        let outcome = match Opcode::from_name(&syscall.opcode) {
            Some(opcode) => {
                let request_bytes = serde_json::to_vec(&syscall.params).unwrap_or_default();
                let dispatched = dispatch(&ctx, syscall.agent_id, opcode as u8, request_bytes).await;
                let value: serde_json::Value =
                    serde_json::from_slice(&dispatched.payload).unwrap_or(serde_json::Value::Null);
                Ok(value)
            }
            None => Err(format!("unknown opcode relayed by tunnel helper: {}", syscall.opcode)),
        };
        if let Err(e) = bridge.send_response(syscall.helper_request_id, outcome).await {
            warn!(error = %e, "failed to send tunnel syscall response to helper");
        }
    }
}

/// Periodically sweeps expired state-store entries, emitting a
/// `StateChanged` expire event per key (`spec.md` §4.J's TTL contract).
fn spawn_sweeper(ctx: Arc<KernelContext>) {
    let interval = Duration::from_millis(ctx.config.sweep_interval_ms);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = ctx.clock.epoch_ms();
            for (key, scope, owner) in ctx.state.sweep_expired(now) {
                ctx.events.publish(agentkernel_core::KernelEvent::new(
                    agentkernel_core::EventType::StateChanged,
                    serde_json::json!({ "op": "expire", "key": key, "scope": scope }),
                    now,
                ));
                let _ = owner;
            }
        }
    });
}
