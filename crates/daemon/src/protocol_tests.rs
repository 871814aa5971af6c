use super::*;

#[test]
fn exec_request_requires_a_timeout_field() {
    let err = parse::<ExecRequest>(br#"{"command":"echo hi"}"#).unwrap_err();
    assert!(matches!(err, agentkernel_core::KernelError::BadRequest(_)));
}

#[test]
fn exec_request_defaults_async_to_false() {
    let req: ExecRequest = parse(br#"{"command":"echo hi","timeout":1000}"#).unwrap();
    assert!(!req.r#async);
}

#[test]
fn agent_target_accepts_either_name_or_id() {
    let by_name: AgentTarget = parse(br#"{"name":"worker"}"#).unwrap();
    assert_eq!(by_name.name.as_deref(), Some("worker"));

    let by_id: AgentTarget = parse(br#"{"id":7}"#).unwrap();
    assert_eq!(by_id.id, Some(7));
}

#[test]
fn resolve_target_name_prefers_an_explicit_id_lookup() {
    let registry = crate::registry::Registry::new();
    let id = registry.allocate(0, agentkernel_core::Permissions::preset(agentkernel_core::PermissionLevel::Standard));
    registry.register_name(id, "worker".into()).unwrap();

    let target = AgentTarget { name: None, id: Some(id.0) };
    assert_eq!(resolve_target_name(&registry, &target).unwrap(), "worker");
}

#[test]
fn resolve_target_name_rejects_an_empty_selector() {
    let registry = crate::registry::Registry::new();
    let target = AgentTarget::default();
    assert!(resolve_target_name(&registry, &target).is_err());
}
