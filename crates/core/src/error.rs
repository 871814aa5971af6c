// SPDX-License-Identifier: MIT

//! Error kinds and the shared kernel error type.
//!
//! `ErrorKind` is the wire-level discriminator carried in reply payloads
//! (`spec.md` §7); `KernelError` is the Rust error subsystems return, which
//! always maps to exactly one `ErrorKind` via [`KernelError::kind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    Unsupported,
    BadRequest,
    PermissionDenied,
    AgentNotFound,
    NameTaken,
    StateKeyNotFound,
    Timeout,
    TooLarge,
    IoError,
    Internal,
    TunnelError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::AgentNotFound => "AgentNotFound",
            ErrorKind::NameTaken => "NameTaken",
            ErrorKind::StateKeyNotFound => "StateKeyNotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::TooLarge => "TooLarge",
            ErrorKind::IoError => "IoError",
            ErrorKind::Internal => "Internal",
            ErrorKind::TunnelError => "TunnelError",
        }
    }
}

/// Error returned by subsystem handlers. Dispatch converts this into a
/// `{success: false, error: <kind>}` reply; the connection stays open
/// except for frame-level protocol errors, which are a separate type
/// (`agentkernel_wire::ProtocolError`) that closes the connection.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("unsupported opcode")]
    Unsupported,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("name already taken: {0}")]
    NameTaken(String),

    #[error("state key not found: {0}")]
    StateKeyNotFound(String),

    #[error("operation timed out")]
    Timeout,

    #[error("{0} exceeds the configured size cap")]
    TooLarge(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("tunnel error: {0}")]
    Tunnel(String),
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Unsupported => ErrorKind::Unsupported,
            KernelError::BadRequest(_) => ErrorKind::BadRequest,
            KernelError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            KernelError::AgentNotFound(_) => ErrorKind::AgentNotFound,
            KernelError::NameTaken(_) => ErrorKind::NameTaken,
            KernelError::StateKeyNotFound(_) => ErrorKind::StateKeyNotFound,
            KernelError::Timeout => ErrorKind::Timeout,
            KernelError::TooLarge(_) => ErrorKind::TooLarge,
            KernelError::Io(_) => ErrorKind::IoError,
            KernelError::Internal(_) => ErrorKind::Internal,
            KernelError::Tunnel(_) => ErrorKind::TunnelError,
        }
    }
}
