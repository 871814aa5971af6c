use super::*;

#[test]
fn star_does_not_cross_slash() {
    assert!(glob_match("/tmp/*", "/tmp/foo", true));
    assert!(!glob_match("/tmp/*", "/tmp/foo/bar", true));
}

#[test]
fn double_star_crosses_slash() {
    assert!(glob_match("/tmp/**", "/tmp/foo/bar/baz", true));
    assert!(glob_match("/tmp/**", "/tmp", true));
}

#[test]
fn command_match_is_literal_not_path_segmented() {
    assert!(glob_match("ls", "ls", false));
    assert!(!glob_match("ls", "ls-extra", false));
}

#[test]
fn deny_wins_over_allow_on_overlap() {
    let mut perms = Permissions::preset(Level::Standard);
    perms.commands.allowed = vec!["*".into()];
    perms.commands.denied = vec!["rm".into()];
    assert!(perms.can_run_command("ls"));
    assert!(!perms.can_run_command("rm"));
}

#[test]
fn domain_match_is_case_insensitive() {
    let mut perms = Permissions::preset(Level::Standard);
    perms.domains.allowed = vec!["Example.COM".into()];
    assert!(perms.can_access_domain("example.com"));
    assert!(perms.can_access_domain("EXAMPLE.COM"));
}

#[test]
fn empty_allowlist_denies_domains_but_not_commands() {
    let mut perms = Permissions::preset(Level::Sandboxed);
    perms.domains.allowed.clear();
    assert!(!perms.can_access_domain("example.com"));
    assert!(perms.can_run_command("anything"));
}

#[test]
fn presets_escalate_capability() {
    assert!(!Permissions::preset(Level::Minimal).exec_enabled);
    assert!(Permissions::preset(Level::Standard).exec_enabled);
    assert!(Permissions::preset(Level::Unrestricted).network_enabled);
    assert!(!Permissions::preset(Level::Sandboxed).network_enabled);
}
