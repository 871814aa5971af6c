// SPDX-License-Identifier: MIT

#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests against the real `agentkerneld` binary (`spec.md` §8
//! scenarios S1-S6). Each test spawns a fresh daemon on its own temp-dir
//! socket, drives it over the real framed wire protocol, and tears it
//! down at the end.

use agentkernel_core::AgentId;
use agentkernel_wire::{read_frame, write_frame, Frame, Opcode};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::net::UnixStream;

struct Daemon {
    child: Child,
    socket_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

async fn spawn_daemon(extra_args: &[&str]) -> Daemon {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("agentkernel.sock");

    let bin = assert_cmd::cargo::cargo_bin("agentkerneld");
    let mut command = Command::new(bin);
    command
        .arg("--socket-path")
        .arg(&socket_path)
        .arg("--log-level")
        .arg("error")
        .args(extra_args)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = command.spawn().expect("spawn agentkerneld");

    for _ in 0..200 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    Daemon { child, socket_path, _dir: dir }
}

async fn connect(daemon: &Daemon) -> UnixStream {
    UnixStream::connect(&daemon.socket_path).await.expect("connect to kernel socket")
}

async fn call(stream: &mut UnixStream, opcode: Opcode, payload: serde_json::Value) -> serde_json::Value {
    let bytes = if payload.is_null() { Vec::new() } else { serde_json::to_vec(&payload).unwrap() };
    let frame = Frame::new(AgentId(0), opcode as u8, bytes);
    write_frame(stream, &frame).await.expect("write frame");
    let reply = read_frame(stream).await.expect("read frame");
    serde_json::from_slice(&reply.payload).unwrap()
}

/// S1: a fresh connection can NOOP-echo arbitrary bytes and HELLO reports
/// a kernel-assigned agent id plus the opcode capability list.
#[tokio::test]
async fn s1_hello_and_noop_handshake() {
    let daemon = spawn_daemon(&[]).await;
    let mut stream = connect(&daemon).await;

    let payload = b"round trip me".to_vec();
    let frame = Frame::new(AgentId(0), Opcode::Noop as u8, payload.clone());
    write_frame(&mut stream, &frame).await.unwrap();
    let reply = read_frame(&mut stream).await.unwrap();
    assert_eq!(reply.payload, payload);

    let hello = call(&mut stream, Opcode::Hello, serde_json::Value::Null).await;
    assert!(hello["agent_id"].as_u64().is_some());
    assert!(hello["capabilities"].as_array().unwrap().iter().any(|c| c == "EXEC"));
    assert!(hello["uptime"].as_u64().is_some());
}

/// S2: two connections register names and exchange a message through
/// SEND/RECV addressed by name rather than raw id.
#[tokio::test]
async fn s2_register_send_recv_by_name() {
    let daemon = spawn_daemon(&[]).await;
    let mut sender = connect(&daemon).await;
    let mut receiver = connect(&daemon).await;

    call(&mut receiver, Opcode::Register, serde_json::json!({"name": "receiver"})).await;

    let sent = call(&mut sender, Opcode::Send, serde_json::json!({"to_name": "receiver", "message": {"hi": true}})).await;
    assert_eq!(sent["success"], true);

    let received = call(&mut receiver, Opcode::Recv, serde_json::json!({"max": 10})).await;
    assert_eq!(received["count"], 1);
    assert_eq!(received["messages"][0]["message"]["hi"], true);
}

/// S3: a sandboxed agent's WRITE to a disallowed path gets `PermissionDenied`,
/// exactly one `SyscallBlocked` event carrying the attempted path when
/// subscribed, and a `Security` audit entry carrying it too (`spec.md` §8 S3).
#[tokio::test]
async fn s3_denied_write_emits_syscall_blocked_and_audit_entry() {
    let daemon = spawn_daemon(&["--default-permission-level", "minimal"]).await;
    let mut stream = connect(&daemon).await;

    call(&mut stream, Opcode::Subscribe, serde_json::json!({"types": ["syscall_blocked"]})).await;

    let result =
        call(&mut stream, Opcode::Write, serde_json::json!({"path": "/etc/passwd", "content": "x", "mode": "write"})).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["error"], "PermissionDenied");

    let events = call(&mut stream, Opcode::PollEvents, serde_json::json!({"max": 10})).await;
    assert_eq!(events["count"], 1);
    assert_eq!(events["events"][0]["type"], "syscall_blocked");
    assert_eq!(events["events"][0]["data"]["path"], "/etc/passwd");

    let audit = call(&mut stream, Opcode::GetAuditLog, serde_json::json!({"category": "Security", "limit": 10})).await;
    let entries = audit["entries"].as_array().unwrap();
    assert!(entries.iter().any(|e| e["action"].as_str().unwrap_or("").contains("WRITE")));
    assert!(entries.iter().any(|e| e["details"]["path"] == "/etc/passwd"));
}

/// S4: a short-TTL key disappears and a `StateChanged` expire event
/// follows once the background sweeper catches up to it.
#[tokio::test]
async fn s4_ttl_expiry_emits_state_changed() {
    let daemon = spawn_daemon(&["--sweep-interval-ms", "50"]).await;
    let mut stream = connect(&daemon).await;

    call(&mut stream, Opcode::Subscribe, serde_json::json!({"types": ["state_changed"]})).await;
    call(&mut stream, Opcode::Store, serde_json::json!({"key": "short", "value": 1, "scope": "agent", "ttl": 10})).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let fetched = call(&mut stream, Opcode::Fetch, serde_json::json!({"key": "short"})).await;
    assert_eq!(fetched["exists"], false);

    let events = call(&mut stream, Opcode::PollEvents, serde_json::json!({"max": 10})).await;
    let kinds: Vec<&str> = events["events"].as_array().unwrap().iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert!(kinds.contains(&"state_changed"));
}

/// S5: a standard-level agent can spawn a short-lived child that exits
/// non-zero and is restarted under an `on_failure` policy.
#[tokio::test]
async fn s5_spawn_crash_restart() {
    let daemon = spawn_daemon(&["--default-permission-level", "standard"]).await;
    let mut stream = connect(&daemon).await;

    let spawned = call(
        &mut stream,
        Opcode::Spawn,
        serde_json::json!({
            "name": "flaky",
            "script": "exit 1",
            "restart_policy": "on_failure",
            "max_restarts": 3,
            "restart_window_s": 60,
        }),
    )
    .await;
    assert_eq!(spawned["success"], true);
    assert_eq!(spawned["status"], "running");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let list = call(&mut stream, Opcode::List, serde_json::Value::Null).await;
    let agents = list["agents"].as_array().unwrap();
    let flaky = agents.iter().find(|a| a["name"] == "flaky").expect("flaky agent present");
    assert!(matches!(flaky["state"].as_str(), Some("running") | Some("crashed")));
}

/// S6: replaying a recording with no non-deterministic opcodes yields
/// byte-identical reply payloads for every replayed entry.
#[tokio::test]
async fn s6_replay_matches_recorded_responses() {
    let daemon = spawn_daemon(&[]).await;
    let mut stream = connect(&daemon).await;

    call(&mut stream, Opcode::RecordStart, serde_json::json!({})).await;
    call(&mut stream, Opcode::Store, serde_json::json!({"key": "replayed", "value": 7, "scope": "agent"})).await;
    call(&mut stream, Opcode::Fetch, serde_json::json!({"key": "replayed"})).await;
    call(&mut stream, Opcode::RecordStop, serde_json::Value::Null).await;

    let status = call(&mut stream, Opcode::RecordStatus, serde_json::json!({"export": true})).await;
    let recording = status["recording_data"].clone();

    let replay = call(&mut stream, Opcode::ReplayStart, serde_json::json!({"recording": recording})).await;
    assert_eq!(replay["mismatches"].as_array().unwrap().len(), 0);
    assert!(replay["replayed"].as_u64().unwrap() >= 2);
}
