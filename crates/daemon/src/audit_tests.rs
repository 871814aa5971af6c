use super::*;
use agentkernel_core::AuditCategory;
use serde_json::json;

#[test]
fn ring_evicts_oldest_past_max_entries() {
    let log = AuditLog::new();
    log.set_config(AuditConfig { max_entries: 3, ..AuditConfig::default() });
    for i in 0..5 {
        log.append(AuditCategory::Syscall, None, format!("op{i}"), json!({}), 0);
    }
    let all = log.query(None, None, None, 100);
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].action, "op2");
    assert_eq!(all[2].action, "op4");
}

#[test]
fn ids_are_monotonic_and_chronological() {
    let log = AuditLog::new();
    for i in 0..3 {
        log.append(AuditCategory::State, None, format!("op{i}"), json!({}), 0);
    }
    let all = log.query(None, None, None, 100);
    assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn disabling_a_category_suppresses_new_entries_without_touching_old_ones() {
    let log = AuditLog::new();
    log.append(AuditCategory::Security, None, "before", json!({}), 0);
    log.set_config(AuditConfig { log_security: false, ..AuditConfig::default() });
    let appended = log.append(AuditCategory::Security, None, "after", json!({}), 0);
    assert!(!appended);
    let all = log.query(Some(AuditCategory::Security), None, None, 100);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].action, "before");
}

#[test]
fn since_id_filters_to_strictly_newer_entries() {
    let log = AuditLog::new();
    for i in 0..4 {
        log.append(AuditCategory::Ipc, None, format!("op{i}"), json!({}), 0);
    }
    let recent = log.query(None, None, Some(2), 100);
    assert_eq!(recent.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 4]);
}
