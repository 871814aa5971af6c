// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agentkernel-core: shared types for the agent microkernel.
//!
//! No I/O lives here — just ids, time, permissions, the error and event
//! vocabulary shared between the wire codec and the daemon.

pub mod audit;
pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod macros;
pub mod permissions;

pub use audit::Category as AuditCategory;
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ErrorKind, KernelError};
pub use event::{EventType, KernelEvent};
pub use id::{AgentId, IdAllocator, KERNEL_AGENT_ID};
pub use permissions::{CommandRules, DomainRules, Level as PermissionLevel, PathRules, Permissions};
