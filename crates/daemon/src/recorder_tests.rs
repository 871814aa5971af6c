use super::*;
use serde_json::json;

#[test]
fn entries_are_only_recorded_while_recording_is_active() {
    let rec = Recorder::new();
    assert!(!rec.observe(AgentId(1), Opcode::Store, json!({}), json!({}), true));
    rec.start(RecordOptions::default());
    assert!(rec.observe(AgentId(1), Opcode::Store, json!({}), json!({}), true));
    rec.stop();
    assert!(!rec.observe(AgentId(1), Opcode::Store, json!({}), json!({}), true));
}

#[test]
fn exec_is_marked_skip_unless_include_exec_is_set() {
    let rec = Recorder::new();
    rec.start(RecordOptions { include_exec: false, ..RecordOptions::default() });
    rec.observe(AgentId(1), Opcode::Exec, json!({}), json!({}), true);
    rec.stop();
    assert!(rec.export()[0].skip_on_replay);
}

#[test]
fn included_exec_is_not_marked_skip() {
    let rec = Recorder::new();
    rec.start(RecordOptions { include_exec: true, ..RecordOptions::default() });
    rec.observe(AgentId(1), Opcode::Exec, json!({}), json!({}), true);
    rec.stop();
    assert!(!rec.export()[0].skip_on_replay);
}

#[test]
fn deterministic_opcodes_are_never_marked_skip() {
    let rec = Recorder::new();
    rec.start(RecordOptions::default());
    rec.observe(AgentId(1), Opcode::Store, json!({}), json!({}), true);
    rec.stop();
    assert!(!rec.export()[0].skip_on_replay);
}

#[test]
fn filter_agents_restricts_which_agents_are_recorded() {
    let rec = Recorder::new();
    rec.start(RecordOptions { filter_agents: vec![AgentId(1)], ..RecordOptions::default() });
    assert!(rec.observe(AgentId(1), Opcode::Store, json!({}), json!({}), true));
    assert!(!rec.observe(AgentId(2), Opcode::Store, json!({}), json!({}), true));
}

#[test]
fn record_control_opcodes_are_always_marked_skip() {
    let rec = Recorder::new();
    rec.start(RecordOptions::default());
    rec.observe(AgentId(1), Opcode::RecordStart, json!({}), json!({}), true);
    rec.observe(AgentId(1), Opcode::ReplayStart, json!({}), json!({}), true);
    rec.stop();
    assert!(rec.export().iter().all(|e| e.skip_on_replay));
}

#[test]
fn seq_numbers_are_assigned_in_order() {
    let rec = Recorder::new();
    rec.start(RecordOptions::default());
    rec.observe(AgentId(1), Opcode::Store, json!({}), json!({}), true);
    rec.observe(AgentId(1), Opcode::Fetch, json!({}), json!({}), true);
    rec.stop();
    let entries = rec.export();
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}
