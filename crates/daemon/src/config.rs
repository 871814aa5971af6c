// SPDX-License-Identifier: MIT

//! Kernel configuration (`spec.md` §6 "CLI surface"): socket path, sandbox
//! defaults, audit size, tunnel helper path, bind permissions. A handful of
//! operational knobs also fall back to environment variables, matching the
//! teacher's `AGENTKERNEL_*`-prefixed convention.

use agentkernel_core::PermissionLevel;
use clap::Parser;
use std::path::PathBuf;

fn env_default(var: &str, fallback: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| fallback.to_string())
}

#[derive(Debug, Parser)]
#[command(name = "agentkerneld")]
#[command(about = "Agent microkernel: a multiplexed syscall server hosting agent processes")]
#[command(version)]
pub struct KernelConfig {
    /// Path to the local stream socket clients connect to.
    #[arg(long, default_value_t = env_default("AGENTKERNEL_SOCKET", "/tmp/agentkernel.sock"))]
    pub socket_path: String,

    /// Optional TCP bind address (`host:port`), gated behind an auth-token
    /// handshake; absent by default since the local socket is the primary
    /// transport (`spec.md` §4.B).
    #[arg(long)]
    pub tcp_addr: Option<String>,

    /// Shared secret a TCP client must present on HELLO before any other
    /// opcode is accepted. Required when `--tcp-addr` is set.
    #[arg(long, env = "AGENTKERNEL_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Default permission level for agents connecting without an explicit
    /// `SET_PERMS` call.
    #[arg(long, value_enum, default_value = "sandboxed")]
    pub default_permission_level: PermissionLevelArg,

    /// Maximum audit log ring size.
    #[arg(long, default_value_t = 10_000)]
    pub audit_max_entries: usize,

    /// Path to an optional tunnel helper executable (`spec.md` §4.P). Absent
    /// unless explicitly configured; the five `tunnel_*` opcodes then reply
    /// `TunnelError`.
    #[arg(long)]
    pub tunnel_helper: Option<PathBuf>,

    /// Interval between state-store TTL sweeps, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub sweep_interval_ms: u64,

    /// Log level passed to the tracing env-filter, following the teacher's
    /// `AGENTKERNEL_LOG` convention.
    #[arg(long, default_value_t = env_default("AGENTKERNEL_LOG", "info"))]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PermissionLevelArg {
    Unrestricted,
    Standard,
    Sandboxed,
    Readonly,
    Minimal,
}

impl From<PermissionLevelArg> for PermissionLevel {
    fn from(value: PermissionLevelArg) -> Self {
        match value {
            PermissionLevelArg::Unrestricted => PermissionLevel::Unrestricted,
            PermissionLevelArg::Standard => PermissionLevel::Standard,
            PermissionLevelArg::Sandboxed => PermissionLevel::Sandboxed,
            PermissionLevelArg::Readonly => PermissionLevel::Readonly,
            PermissionLevelArg::Minimal => PermissionLevel::Minimal,
        }
    }
}

impl KernelConfig {
    pub fn default_permission_level(&self) -> PermissionLevel {
        self.default_permission_level.into()
    }

    /// A config suitable for unit and integration tests: a fresh temp-dir
    /// socket path, no TCP listener, no tunnel helper.
    pub fn for_test() -> Self {
        let path = std::env::temp_dir().join(format!("agentkernel-test-{}.sock", std::process::id()));
        Self {
            socket_path: path.to_string_lossy().into_owned(),
            tcp_addr: None,
            auth_token: None,
            default_permission_level: PermissionLevelArg::Sandboxed,
            audit_max_entries: 1000,
            tunnel_helper: None,
            sweep_interval_ms: 1000,
            log_level: "info".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
