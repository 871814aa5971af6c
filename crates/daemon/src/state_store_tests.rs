use super::*;
use serde_json::json;

#[test]
fn fetch_after_store_returns_the_same_value_and_scope() {
    let store = StateStore::new();
    let caller = AgentId(1);
    store.store(caller, "k".into(), json!(1), Scope::Global, None, 0);
    let (value, scope) = store.fetch(caller, "k", 0).unwrap();
    assert_eq!(value, json!(1));
    assert_eq!(scope, Scope::Global);
}

#[test]
fn ttl_expiry_hides_the_entry_after_the_deadline() {
    let store = StateStore::new();
    let caller = AgentId(1);
    store.store(caller, "k".into(), json!(1), Scope::Global, Some(1), 0);
    assert!(store.fetch(caller, "k", 500).is_some());
    assert!(store.fetch(caller, "k", 2000).is_none());
}

#[test]
fn agent_scope_takes_priority_over_global_for_the_owner() {
    let store = StateStore::new();
    let caller = AgentId(1);
    store.store(caller, "k".into(), json!("global"), Scope::Global, None, 0);
    store.store(caller, "k".into(), json!("agent"), Scope::Agent, None, 0);
    let (value, scope) = store.fetch(caller, "k", 0).unwrap();
    assert_eq!(value, json!("agent"));
    assert_eq!(scope, Scope::Agent);
}

#[test]
fn agent_scoped_entries_are_dropped_when_the_owner_is_removed() {
    let store = StateStore::new();
    let caller = AgentId(1);
    store.store(caller, "k".into(), json!(1), Scope::Agent, None, 0);
    store.remove_agent(caller);
    assert!(store.fetch(caller, "k", 0).is_none());
}

#[test]
fn sweep_expired_reports_and_removes_stale_entries() {
    let store = StateStore::new();
    let caller = AgentId(1);
    store.store(caller, "k".into(), json!(1), Scope::Global, Some(1), 0);
    let expired = store.sweep_expired(5000);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].0, "k");
    assert!(store.fetch(caller, "k", 5000).is_none());
}

#[test]
fn list_keys_filters_by_prefix_and_dedupes() {
    let store = StateStore::new();
    let caller = AgentId(1);
    store.store(caller, "app/a".into(), json!(1), Scope::Global, None, 0);
    store.store(caller, "app/b".into(), json!(1), Scope::Global, None, 0);
    store.store(caller, "other".into(), json!(1), Scope::Global, None, 0);
    let keys = store.list_keys(caller, "app/");
    assert_eq!(keys, vec!["app/a", "app/b"]);
}
