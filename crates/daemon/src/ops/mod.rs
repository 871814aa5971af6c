// SPDX-License-Identifier: MIT

//! Operation families gated by the permission engine: filesystem (§4.F),
//! exec (§4.G), HTTP (§4.H), and the LLM "think" stub.

pub mod exec;
pub mod fs;
pub mod http;
pub mod think;
