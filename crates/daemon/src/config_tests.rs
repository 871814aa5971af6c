use super::*;

#[test]
fn for_test_config_has_no_tcp_listener_or_tunnel_helper() {
    let config = KernelConfig::for_test();
    assert!(config.tcp_addr.is_none());
    assert!(config.tunnel_helper.is_none());
}

#[test]
fn default_permission_level_converts_to_the_core_enum() {
    let config = KernelConfig::for_test();
    assert_eq!(config.default_permission_level(), PermissionLevel::Sandboxed);
}
