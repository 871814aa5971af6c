// SPDX-License-Identifier: MIT

//! Permission engine (`spec.md` §4.E): evaluates per-agent capabilities at
//! the opcode boundary. The matching primitives (glob, presets) live in
//! `agentkernel_core::permissions`; this module adds path normalization and
//! the opcode-family capability table.

use agentkernel_core::{KernelError, PermissionLevel, Permissions};
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path (no filesystem access, so it also works for
/// paths that don't exist yet, e.g. a `WRITE` target). Rejects any path
/// whose normalized form still contains `..` — `spec.md` §4.E requires this
/// even if no glob would otherwise match, since a path that can't be
/// normalized away from `..` is refusing to commit to a location at all.
pub fn normalize_path(path: &str) -> Result<PathBuf, KernelError> {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    return Err(KernelError::PermissionDenied(format!(
                        "path escapes its root: {path}"
                    )));
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

pub fn check_read_path(perms: &Permissions, path: &str) -> Result<PathBuf, KernelError> {
    let normalized = normalize_path(path)?;
    if perms.can_read_path(&normalized.to_string_lossy()) {
        Ok(normalized)
    } else {
        Err(KernelError::PermissionDenied(format!("read denied: {path}")))
    }
}

pub fn check_write_path(perms: &Permissions, path: &str) -> Result<PathBuf, KernelError> {
    let normalized = normalize_path(path)?;
    if perms.can_write_path(&normalized.to_string_lossy()) {
        Ok(normalized)
    } else {
        Err(KernelError::PermissionDenied(format!("write denied: {path}")))
    }
}

pub fn check_exec(perms: &Permissions, program: &str) -> Result<(), KernelError> {
    if !perms.exec_enabled {
        return Err(KernelError::PermissionDenied("exec disabled".into()));
    }
    if !perms.can_run_command(program) {
        return Err(KernelError::PermissionDenied(format!("command denied: {program}")));
    }
    Ok(())
}

pub fn check_domain(perms: &Permissions, host: &str) -> Result<(), KernelError> {
    if !perms.network_enabled {
        return Err(KernelError::PermissionDenied("network disabled".into()));
    }
    if !perms.can_access_domain(host) {
        return Err(KernelError::PermissionDenied(format!("domain denied: {host}")));
    }
    Ok(())
}

/// `spawn, kill, pause, resume, set_perms` require caller level ≥ `standard`
/// (`spec.md` §4.E); `set_perms` on another agent additionally requires
/// `unrestricted`, checked separately by the caller since it needs to know
/// whether the target is the caller itself.
pub fn check_level_at_least(perms: &Permissions, required: PermissionLevel) -> Result<(), KernelError> {
    if perms.level >= required {
        Ok(())
    } else {
        Err(KernelError::PermissionDenied(format!(
            "requires level >= {required}, caller has {}",
            perms.level
        )))
    }
}

#[cfg(test)]
#[path = "perm_engine_tests.rs"]
mod tests;
