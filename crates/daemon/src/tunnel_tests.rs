use super::*;
use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;

/// Writes an executable shell script implementing a tiny slice of the
/// helper protocol and returns its path (kept alive via the returned
/// `tempfile::TempDir`, which must stay in scope for the test's duration).
fn helper_script(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("helper.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh\n{body}").unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    (dir, path)
}

fn test_bridge(script: &str) -> (tempfile::TempDir, Arc<TunnelBridge>) {
    let (dir, path) = helper_script(script);
    let registry = Arc::new(Registry::new());
    let events = Arc::new(EventBus::new());
    let bridge = TunnelBridge::spawn(&path, registry, events).unwrap();
    (dir, bridge)
}

#[tokio::test]
async fn connect_round_trips_through_the_helper_protocol() {
    let (_dir, bridge) = test_bridge(
        r#"while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  printf '{"id":"%s","result":{"ok":true}}\n' "$id"
done"#,
    );
    let result = bridge.connect(serde_json::json!({"url": "wss://example"})).await.unwrap();
    assert_eq!(result["ok"], true);
}

#[tokio::test]
async fn helper_error_reply_becomes_a_tunnel_error() {
    let (_dir, bridge) = test_bridge(
        r#"while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  printf '{"id":"%s","error":"auth failed"}\n' "$id"
done"#,
    );
    let err = bridge.status().await.unwrap_err();
    assert!(matches!(err, KernelError::Tunnel(msg) if msg == "auth failed"));
}

#[tokio::test]
async fn agent_connected_event_synthesizes_a_remote_agent_above_the_reserved_base() {
    let (dir, path) = helper_script(r#"printf '{"event":"agent_connected","data":{}}\n'; cat >/dev/null"#);
    let registry = Arc::new(Registry::new());
    let events = Arc::new(EventBus::new());
    let _bridge = TunnelBridge::spawn(&path, Arc::clone(&registry), events).unwrap();

    for _ in 0..50 {
        if registry.list().iter().any(|a| a.id.0 >= REMOTE_ID_BASE) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(registry.list().iter().any(|a| a.id.0 >= REMOTE_ID_BASE));
    drop(dir);
}

#[tokio::test]
async fn syscall_event_is_queued_for_the_dispatch_core() {
    let (_dir, path) = helper_script(
        r#"printf '{"id":"helper-1","event":"syscall","data":{"agent_id":1000,"opcode":"fs_read","params":{}}}\n'; cat >/dev/null"#,
    );
    let registry = Arc::new(Registry::new());
    let events = Arc::new(EventBus::new());
    let bridge = TunnelBridge::spawn(&path, registry, events).unwrap();

    let syscall = tokio::time::timeout(std::time::Duration::from_secs(2), bridge.next_remote_syscall())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(syscall.helper_request_id, "helper-1");
    assert_eq!(syscall.agent_id, AgentId(1000));
    assert_eq!(syscall.opcode, "fs_read");
}
