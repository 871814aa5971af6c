use super::*;
use agentkernel_core::{Permissions, PermissionLevel};

fn standard() -> Permissions {
    Permissions::preset(PermissionLevel::Standard)
}

#[test]
fn name_map_is_a_bijection_over_live_agents() {
    let reg = Registry::new();
    let a = reg.allocate(0, standard());
    let b = reg.allocate(0, standard());

    reg.register_name(a, "worker".into()).unwrap();
    assert_eq!(reg.resolve("worker"), Some(a));

    let err = reg.register_name(b, "worker".into()).unwrap_err();
    assert!(matches!(err, KernelError::NameTaken(_)));

    reg.remove(a);
    assert_eq!(reg.resolve("worker"), None);

    reg.register_name(b, "worker".into()).unwrap();
    assert_eq!(reg.resolve("worker"), Some(b));
}

#[test]
fn remove_does_not_clobber_a_name_reassigned_to_another_agent() {
    let reg = Registry::new();
    let a = reg.allocate(0, standard());
    reg.register_name(a, "worker".into()).unwrap();
    reg.remove(a);

    let b = reg.allocate(0, standard());
    reg.register_name(b, "worker".into()).unwrap();

    // a's record is gone; re-removing a must not touch b's claim on the name.
    reg.remove(a);
    assert_eq!(reg.resolve("worker"), Some(b));
}

#[test]
fn list_is_sorted_by_id() {
    let reg = Registry::new();
    let ids: Vec<_> = (0..5).map(|_| reg.allocate(0, standard())).collect();
    let listed: Vec<_> = reg.list().into_iter().map(|a| a.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
}

#[test]
fn remove_of_absent_id_is_not_an_error() {
    let reg = Registry::new();
    reg.remove(AgentId(9999));
}

#[test]
fn insert_remote_rejects_a_collision_with_a_live_id() {
    let reg = Registry::new();
    assert!(reg.insert_remote(AgentId(1000), 0, standard()));
    assert!(!reg.insert_remote(AgentId(1000), 0, standard()));
    assert_eq!(reg.get(AgentId(1000)).unwrap().state, AgentState::Running);
}

#[test]
fn renaming_an_agent_releases_its_old_name() {
    let reg = Registry::new();
    let a = reg.allocate(0, standard());
    reg.register_name(a, "one".into()).unwrap();
    reg.register_name(a, "two".into()).unwrap();
    assert_eq!(reg.resolve("one"), None);
    assert_eq!(reg.resolve("two"), Some(a));
}
