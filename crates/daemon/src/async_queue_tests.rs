use super::*;
use serde_json::json;

fn result(agent: u32, id: &str) -> AsyncResult {
    AsyncResult { request_id: id.into(), agent_id: AgentId(agent), opcode: 0x02, success: true, value: json!(null), error: None }
}

#[test]
fn pending_requests_are_not_returned_by_poll() {
    let queue = AsyncQueue::new();
    queue.begin(AgentId(1), "r1".into());
    assert_eq!(queue.poll(AgentId(1), 10).len(), 0);
}

#[test]
fn completed_requests_are_drained_and_removed() {
    let queue = AsyncQueue::new();
    queue.begin(AgentId(1), "r1".into());
    queue.complete(result(1, "r1"));
    let drained = queue.poll(AgentId(1), 10);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].request_id, "r1");
    assert_eq!(queue.poll(AgentId(1), 10).len(), 0);
}

#[test]
fn poll_only_returns_entries_for_the_requesting_agent() {
    let queue = AsyncQueue::new();
    queue.complete(result(1, "r1"));
    queue.complete(result(2, "r2"));
    assert_eq!(queue.poll(AgentId(1), 10).len(), 1);
    assert_eq!(queue.poll(AgentId(2), 10).len(), 1);
}

#[test]
fn remove_agent_drops_its_pending_and_ready_slots() {
    let queue = AsyncQueue::new();
    queue.begin(AgentId(1), "r1".into());
    queue.complete(result(1, "r2"));
    queue.remove_agent(AgentId(1));
    assert_eq!(queue.poll(AgentId(1), 10).len(), 0);
}
