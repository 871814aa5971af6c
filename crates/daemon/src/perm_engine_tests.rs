use super::*;
use agentkernel_core::PathRules;

#[test]
fn normalize_collapses_dot_segments() {
    assert_eq!(normalize_path("a/./b/../c").unwrap(), PathBuf::from("a/c"));
}

#[test]
fn normalize_rejects_escaping_parent_dirs() {
    assert!(normalize_path("../../etc/passwd").is_err());
}

#[test]
fn deny_list_wins_over_overlapping_allow_list() {
    let mut perms = Permissions::preset(PermissionLevel::Unrestricted);
    perms.commands.allowed = vec!["git".into()];
    perms.commands.denied = vec!["git".into()];
    assert!(!perms.can_run_command("git"));
}

#[test]
fn write_denied_outside_allowed_roots() {
    let mut perms = Permissions::preset(PermissionLevel::Sandboxed);
    perms.paths = PathRules { read: vec!["/tmp/**".into()], write: vec!["/tmp/**".into()] };
    assert!(check_write_path(&perms, "/tmp/scratch/out.txt").is_ok());
    assert!(check_write_path(&perms, "/etc/passwd").is_err());
}

#[test]
fn exec_requires_enabled_flag_before_command_match() {
    let mut perms = Permissions::preset(PermissionLevel::Standard);
    perms.exec_enabled = false;
    assert!(check_exec(&perms, "ls").is_err());
}

#[test]
fn level_ordering_gates_lifecycle_opcodes() {
    let minimal = Permissions::preset(PermissionLevel::Minimal);
    assert!(check_level_at_least(&minimal, PermissionLevel::Standard).is_err());
    let standard = Permissions::preset(PermissionLevel::Standard);
    assert!(check_level_at_least(&standard, PermissionLevel::Standard).is_ok());
}
