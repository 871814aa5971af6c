// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agentkernel-wire: the framed binary wire protocol and opcode catalog
//! shared by the kernel daemon and anything that speaks to it.

mod error;
mod frame;
mod opcode;

pub use error::ProtocolError;
pub use frame::{read_frame, write_frame, Frame, HEADER_LEN, MAGIC, MAX_PAYLOAD_LEN};
pub use opcode::{Opcode, OpcodeCategory, ALL_OPCODES};
