// SPDX-License-Identifier: MIT

use thiserror::Error;

/// A frame-level protocol error. Unlike `agentkernel_core::KernelError`,
/// every variant here is fatal to the connection (`spec.md` §4.A, §7):
/// the caller closes the socket and writes a terminal `Security` audit
/// entry rather than replying with an error frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("payload length {actual} exceeds the {cap} byte cap")]
    PayloadTooLarge { actual: u64, cap: u64 },

    #[error("connection closed before a full frame was received")]
    Eof,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
