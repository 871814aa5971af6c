// SPDX-License-Identifier: MIT

//! Permission model: levels, path/command/domain allowlists, and the glob
//! matcher used to evaluate them.
//!
//! This module only defines data and pure matching logic; the permission
//! *engine* that wires opcode -> capability and emits audit/events lives in
//! the daemon crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named permission presets, ordered loosely by how much they allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Minimal,
    Readonly,
    Sandboxed,
    Standard,
    Unrestricted,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Minimal => "minimal",
            Level::Readonly => "readonly",
            Level::Sandboxed => "sandboxed",
            Level::Standard => "standard",
            Level::Unrestricted => "unrestricted",
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathRules {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRules {
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub denied: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainRules {
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub denied: Vec<String>,
}

/// Per-agent capability set. Attached to an `Agent`; replaced wholesale by
/// `SET_PERMS`, never mutated field-by-field (so a reader always sees a
/// consistent snapshot under the copy-on-write lock the registry holds it
/// behind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permissions {
    pub level: Level,
    #[serde(default)]
    pub paths: PathRules,
    #[serde(default)]
    pub commands: CommandRules,
    #[serde(default)]
    pub domains: DomainRules,
    pub exec_enabled: bool,
    pub max_exec_time_ms: u64,
    pub network_enabled: bool,
}

impl Permissions {
    pub fn preset(level: Level) -> Self {
        match level {
            Level::Unrestricted => Self {
                level,
                paths: PathRules { read: vec!["**".into()], write: vec!["**".into()] },
                commands: CommandRules::default(),
                domains: DomainRules { allowed: vec!["*".into()], denied: vec![] },
                exec_enabled: true,
                max_exec_time_ms: 300_000,
                network_enabled: true,
            },
            Level::Standard => Self {
                level,
                paths: PathRules {
                    read: vec!["**".into()],
                    write: vec!["./**".into(), "/tmp/**".into()],
                },
                commands: CommandRules::default(),
                domains: DomainRules { allowed: vec!["*".into()], denied: vec![] },
                exec_enabled: true,
                max_exec_time_ms: 60_000,
                network_enabled: true,
            },
            Level::Sandboxed => Self {
                level,
                paths: PathRules {
                    read: vec!["./**".into(), "/tmp/**".into()],
                    write: vec!["/tmp/**".into()],
                },
                commands: CommandRules::default(),
                domains: DomainRules::default(),
                exec_enabled: true,
                max_exec_time_ms: 30_000,
                network_enabled: false,
            },
            Level::Readonly => Self {
                level,
                paths: PathRules { read: vec!["**".into()], write: vec![] },
                commands: CommandRules::default(),
                domains: DomainRules::default(),
                exec_enabled: false,
                max_exec_time_ms: 0,
                network_enabled: false,
            },
            Level::Minimal => Self {
                level,
                paths: PathRules::default(),
                commands: CommandRules::default(),
                domains: DomainRules::default(),
                exec_enabled: false,
                max_exec_time_ms: 0,
                network_enabled: false,
            },
        }
    }

    pub fn can_read_path(&self, path: &str) -> bool {
        path_allowed(path, &self.paths.read)
    }

    pub fn can_write_path(&self, path: &str) -> bool {
        path_allowed(path, &self.paths.write)
    }

    /// Command allowlisting: deny wins when both an allow and a deny glob
    /// would otherwise match (`spec.md` §8 boundary behavior).
    pub fn can_run_command(&self, program: &str) -> bool {
        if self.commands.denied.iter().any(|p| glob_match(p, program, false)) {
            return false;
        }
        if self.commands.allowed.is_empty() {
            return true;
        }
        self.commands.allowed.iter().any(|p| glob_match(p, program, false))
    }

    /// Domain allowlisting matches the host portion of a URL, case-insensitively.
    pub fn can_access_domain(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if self.domains.denied.iter().any(|p| glob_match(&p.to_ascii_lowercase(), &host, false)) {
            return false;
        }
        if self.domains.allowed.is_empty() {
            return false;
        }
        self.domains.allowed.iter().any(|p| glob_match(&p.to_ascii_lowercase(), &host, false))
    }
}

fn path_allowed(path: &str, rules: &[String]) -> bool {
    rules.iter().any(|p| glob_match(p, path, true))
}

/// Shell-style glob match where `*` does not cross `/` unless the pattern
/// segment is the literal `**`, which matches any number of path segments.
/// When `path_mode` is false (commands, domains), `*` behaves as an ordinary
/// single-segment wildcard over the whole string (there are no `/` separators
/// to respect).
pub fn glob_match(pattern: &str, text: &str, path_mode: bool) -> bool {
    if pattern == "**" {
        return true;
    }
    if !path_mode {
        return glob_match_segment(pattern, text);
    }
    let pat_segs: Vec<&str> = pattern.split('/').collect();
    let txt_segs: Vec<&str> = text.split('/').collect();
    match_segments(&pat_segs, &txt_segs)
}

fn match_segments(pat: &[&str], txt: &[&str]) -> bool {
    match pat.split_first() {
        None => txt.is_empty(),
        Some((&"**", rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=txt.len()).any(|i| match_segments(rest, &txt[i..]))
        }
        Some((seg, rest)) => match txt.split_first() {
            Some((t, txt_rest)) => glob_match_segment(seg, t) && match_segments(rest, txt_rest),
            None => false,
        },
    }
}

/// Match a single non-`/`-crossing glob segment against a single-segment
/// string using a standard `*`/`?`/literal scan.
fn glob_match_segment(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_from(&p, &t)
}

fn match_from(p: &[char], t: &[char]) -> bool {
    match p.split_first() {
        None => t.is_empty(),
        Some((&'*', rest)) => (0..=t.len()).any(|i| match_from(rest, &t[i..])),
        Some((&'?', rest)) => !t.is_empty() && match_from(rest, &t[1..]),
        Some((c, rest)) => t.first() == Some(c) && match_from(rest, &t[1..]),
    }
}

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;
