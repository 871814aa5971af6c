use super::*;
use crate::config::KernelConfig;
use agentkernel_core::{AuditCategory, EventType, FakeClock, Permissions};

fn test_context() -> Arc<KernelContext> {
    KernelContext::new(Arc::new(KernelConfig::for_test()), Arc::new(FakeClock::new()))
}

#[tokio::test]
async fn noop_echoes_the_payload_unchanged() {
    let ctx = test_context();
    let id = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));
    let payload = b"whatever bytes".to_vec();
    let out = dispatch(&ctx, id, Opcode::Noop as u8, payload.clone()).await;
    assert_eq!(out.payload, payload);
    assert!(!out.close);
}

#[tokio::test]
async fn hello_reports_the_caller_agent_id() {
    let ctx = test_context();
    let id = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));
    let out = dispatch(&ctx, id, Opcode::Hello as u8, Vec::new()).await;
    let v: serde_json::Value = serde_json::from_slice(&out.payload).unwrap();
    assert_eq!(v["agent_id"], id.0);
    assert!(v["capabilities"].as_array().is_some());
}

#[tokio::test]
async fn unknown_opcode_replies_unsupported() {
    let ctx = test_context();
    let id = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));
    let out = dispatch(&ctx, id, 0x99, Vec::new()).await;
    let v: serde_json::Value = serde_json::from_slice(&out.payload).unwrap();
    assert_eq!(v["success"], false);
    assert_eq!(v["error"], "Unsupported");
}

#[tokio::test]
async fn store_then_fetch_roundtrips_a_value() {
    let ctx = test_context();
    let id = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));

    let store_payload = serde_json::to_vec(&serde_json::json!({"key": "k", "value": 42, "scope": "agent"})).unwrap();
    let stored = dispatch(&ctx, id, Opcode::Store as u8, store_payload).await;
    let stored: serde_json::Value = serde_json::from_slice(&stored.payload).unwrap();
    assert_eq!(stored["success"], true);

    let fetch_payload = serde_json::to_vec(&serde_json::json!({"key": "k"})).unwrap();
    let fetched = dispatch(&ctx, id, Opcode::Fetch as u8, fetch_payload).await;
    let fetched: serde_json::Value = serde_json::from_slice(&fetched.payload).unwrap();
    assert_eq!(fetched["exists"], true);
    assert_eq!(fetched["value"], 42);
}

#[tokio::test]
async fn exec_denied_for_a_minimal_agent_emits_syscall_blocked_when_subscribed() {
    let ctx = test_context();
    let id = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Minimal));
    ctx.events.subscribe(id, &[EventType::SyscallBlocked]);

    let exec_payload = serde_json::to_vec(&serde_json::json!({"command": "echo hi", "timeout": 1000})).unwrap();
    let out = dispatch(&ctx, id, Opcode::Exec as u8, exec_payload).await;
    let v: serde_json::Value = serde_json::from_slice(&out.payload).unwrap();
    assert_eq!(v["success"], false);
    assert_eq!(v["error"], "PermissionDenied");

    let events = ctx.events.poll(id, 10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventType::SyscallBlocked);
    assert_eq!(events[0].data["command"], "echo hi");

    let entries = ctx.audit.query(Some(AuditCategory::Security), None, None, 10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].details["command"], "echo hi");
}

#[tokio::test]
async fn send_then_recv_delivers_a_message() {
    let ctx = test_context();
    let sender = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));
    let receiver = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));

    let send_payload = serde_json::to_vec(&serde_json::json!({"to": receiver.0, "message": {"hi": true}})).unwrap();
    let sent = dispatch(&ctx, sender, Opcode::Send as u8, send_payload).await;
    let sent: serde_json::Value = serde_json::from_slice(&sent.payload).unwrap();
    assert_eq!(sent["success"], true);

    let recv_payload = serde_json::to_vec(&serde_json::json!({"max": 10})).unwrap();
    let received = dispatch(&ctx, receiver, Opcode::Recv as u8, recv_payload).await;
    let received: serde_json::Value = serde_json::from_slice(&received.payload).unwrap();
    assert_eq!(received["count"], 1);
    assert_eq!(received["messages"][0]["from"], sender.0);
}

#[tokio::test]
async fn exit_closes_the_connection() {
    let ctx = test_context();
    let id = ctx.registry.allocate(0, Permissions::preset(PermissionLevel::Standard));
    let out = dispatch(&ctx, id, Opcode::Exit as u8, Vec::new()).await;
    assert!(out.close);
}
