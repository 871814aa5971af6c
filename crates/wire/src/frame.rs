// SPDX-License-Identifier: MIT

//! The framed binary protocol (`spec.md` §4.A).
//!
//! ```text
//! offset  size  field
//! 0       4     magic = 0x41474E54 ("AGNT")
//! 4       4     agent_id (u32)
//! 8       1     opcode (u8)
//! 9       8     payload_length (u64)
//! 17      N     payload (N = payload_length bytes)
//! ```
//!
//! Purely mechanical and stateless: this module knows nothing about opcode
//! semantics, only how to get bytes on and off the wire.

use crate::error::ProtocolError;
use agentkernel_core::AgentId;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAGIC: u32 = 0x4147_4E54;
pub const HEADER_LEN: usize = 17;
pub const MAX_PAYLOAD_LEN: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub agent_id: AgentId,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(agent_id: AgentId, opcode: u8, payload: Vec<u8>) -> Self {
        Self { agent_id, opcode, payload }
    }

    /// Encode this frame into its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&self.agent_id.0.to_le_bytes());
        out.push(self.opcode);
        out.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode a frame from an exact byte buffer (header + payload already
    /// assembled). Used by unit tests and the property tests; production
    /// code reads incrementally via [`read_frame`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::Eof);
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic { expected: MAGIC, actual: magic });
        }
        let agent_id = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let opcode = bytes[8];
        let payload_length =
            u64::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15], bytes[16]]);
        if payload_length > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge { actual: payload_length, cap: MAX_PAYLOAD_LEN });
        }
        let payload = bytes
            .get(HEADER_LEN..HEADER_LEN + payload_length as usize)
            .ok_or(ProtocolError::Eof)?
            .to_vec();
        Ok(Frame { agent_id: AgentId(agent_id), opcode, payload })
    }
}

/// Read one frame from an async stream, blocking until the full header and
/// then the full payload have arrived.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Eof
        } else {
            ProtocolError::Io(e)
        }
    })?;

    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic { expected: MAGIC, actual: magic });
    }
    let agent_id = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let opcode = header[8];
    let payload_length =
        u64::from_le_bytes([header[9], header[10], header[11], header[12], header[13], header[14], header[15], header[16]]);
    if payload_length > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge { actual: payload_length, cap: MAX_PAYLOAD_LEN });
    }

    let mut payload = vec![0u8; payload_length as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Eof
        } else {
            ProtocolError::Io(e)
        }
    })?;

    Ok(Frame { agent_id: AgentId(agent_id), opcode, payload })
}

/// Write one frame to an async stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), ProtocolError> {
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
