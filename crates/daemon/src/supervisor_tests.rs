use super::*;
use crate::registry::Registry;
use agentkernel_core::SystemClock;
use std::sync::Arc;
use std::time::Duration;

fn test_supervisor() -> Arc<Supervisor> {
    Supervisor::new(
        Arc::new(Registry::new()),
        Arc::new(EventBus::new()),
        Arc::new(AuditLog::new()),
        Arc::new(SystemClock),
    )
}

fn request(name: &str, script: &str, policy: RestartPolicy) -> SpawnRequest {
    SpawnRequest {
        name: name.to_string(),
        script: script.to_string(),
        sandboxed: false,
        network: false,
        limits: Limits::default(),
        restart_policy: policy,
        max_restarts: 2,
        restart_window_s: 60,
    }
}

#[tokio::test]
async fn spawn_registers_the_agent_as_running() {
    let supervisor = test_supervisor();
    let (agent_id, pid) = supervisor
        .spawn(request("sleeper", "sleep 5", RestartPolicy::Never))
        .await
        .unwrap();
    assert!(pid > 0);
    let record = supervisor.registry.get(agent_id).unwrap();
    assert_eq!(record.state, crate::registry::AgentState::Running);
    supervisor.kill("sleeper").await.unwrap();
}

#[tokio::test]
async fn spawning_the_same_name_twice_fails_with_name_taken() {
    let supervisor = test_supervisor();
    supervisor.spawn(request("dup", "sleep 5", RestartPolicy::Never)).await.unwrap();
    let err = supervisor.spawn(request("dup", "sleep 5", RestartPolicy::Never)).await.unwrap_err();
    assert!(matches!(err, KernelError::NameTaken(_)));
    supervisor.kill("dup").await.unwrap();
}

#[tokio::test]
async fn a_failing_child_restarts_on_failure_within_budget() {
    let supervisor = test_supervisor();
    let (agent_id, _) = supervisor
        .spawn(request("flaky", "false", RestartPolicy::OnFailure))
        .await
        .unwrap();

    // Give the watcher time to observe the exit and respawn.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let record = supervisor.registry.get(agent_id).unwrap();
    assert!(matches!(
        record.state,
        crate::registry::AgentState::Running | crate::registry::AgentState::Crashed
    ));
}

#[tokio::test]
async fn kill_suppresses_restart() {
    let supervisor = test_supervisor();
    let (agent_id, _) = supervisor
        .spawn(request("killed", "sleep 5", RestartPolicy::Always))
        .await
        .unwrap();
    supervisor.kill("killed").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let record = supervisor.registry.get(agent_id).unwrap();
    assert_eq!(record.state, crate::registry::AgentState::Stopped);
}
