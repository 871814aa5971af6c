// SPDX-License-Identifier: MIT

//! THINK op (`spec.md` §4.I): delegates to an external LLM provider.
//!
//! The kernel does not embed or call out to any specific model provider;
//! per SPEC_FULL.md's Non-goals this is a documented protocol stub. A real
//! deployment wires this up to a local helper process over the same kind
//! of stdio-JSON bridge the tunnel module uses.

use agentkernel_core::KernelError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ThinkResult {
    pub success: bool,
    pub content: String,
}

pub async fn think(_prompt: &str, _model: Option<&str>) -> Result<ThinkResult, KernelError> {
    Err(KernelError::Internal("no LLM provider configured".into()))
}

#[cfg(test)]
#[path = "think_tests.rs"]
mod tests;
