#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod common;

use std::time::Duration;

use sandbox::{
    Container, ContainerState, Sandbox, SandboxData, SandboxError, SandboxState, Sandboxer,
};
use sandbox_slot::resource::annotations::{CPU_LIMIT, MEMORY_LIMIT, PID_LIMIT};
use serde_json::json;

use common::{container_data, sandbox_data, sandboxer, spec};

#[tokio::test]
async fn full_lifecycle() {
    let (_dir, sb) = sandboxer();

    let handle = sb
        .create("pod", sandbox_data("pod", &[(CPU_LIMIT, "2")]))
        .await
        .unwrap();
    assert_eq!(handle.read().await.state(), SandboxState::Created);

    sb.start("pod").await.unwrap();
    sb.append_container("pod", "app", container_data("app", "pod", &[]))
        .await
        .unwrap();
    sb.start_container("pod", "app").await.unwrap();
    sb.stop_container("pod", "app").await.unwrap();
    sb.remove_container("pod", "app").await.unwrap();
    sb.stop("pod", false).await.unwrap();

    let status = sb.status("pod").await.unwrap();
    assert_eq!(status.state, SandboxState::Stopped);
    assert!(status.started_at.is_some());
    assert!(status.stopped_at.is_some());
    assert!(status.containers.is_empty());

    sb.delete("pod", false).await.unwrap();
    assert!(sb.list().await.is_empty());
}

#[tokio::test]
async fn duplicate_create_fails() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    let err = sb.create("pod", SandboxData::default()).await.unwrap_err();
    assert!(matches!(err, SandboxError::DuplicateId(id) if id == "pod"));
    assert_eq!(sb.list().await, ["pod"]);
}

#[tokio::test]
async fn delete_without_stop_is_invalid() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    let err = sb.delete("pod", false).await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidState { op: "delete", .. }));

    sb.start("pod").await.unwrap();
    let err = sb.delete("pod", false).await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidState { op: "delete", .. }));
    assert_eq!(sb.status("pod").await.unwrap().state, SandboxState::Running);
}

#[tokio::test]
async fn forced_delete_accepts_any_state() {
    let (_dir, sb) = sandboxer();

    sb.create("created", SandboxData::default()).await.unwrap();
    sb.create("running", SandboxData::default()).await.unwrap();
    sb.start("running").await.unwrap();

    sb.delete("created", true).await.unwrap();
    sb.delete("running", true).await.unwrap();
    assert!(sb.list().await.is_empty());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    sb.start("pod").await.unwrap();
    sb.stop("pod", false).await.unwrap();
    sb.stop("pod", false).await.unwrap();
    sb.stop("pod", true).await.unwrap();
    assert_eq!(sb.status("pod").await.unwrap().state, SandboxState::Stopped);
}

#[tokio::test]
async fn start_requires_created() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    sb.start("pod").await.unwrap();
    let err = sb.start("pod").await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidState { op: "start", .. }));

    sb.stop("pod", false).await.unwrap();
    let err = sb.start("pod").await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidState { op: "start", .. }));
}

#[tokio::test]
async fn stop_refuses_running_containers_unless_forced() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    sb.start("pod").await.unwrap();
    sb.append_container("pod", "app", container_data("app", "pod", &[]))
        .await
        .unwrap();
    sb.start_container("pod", "app").await.unwrap();

    let err = sb.stop("pod", false).await.unwrap_err();
    assert!(matches!(err, SandboxError::InvalidState { op: "stop", .. }));

    sb.stop("pod", true).await.unwrap();
    let status = sb.status("pod").await.unwrap();
    assert_eq!(status.state, SandboxState::Stopped);
    assert_eq!(status.containers[0].state, ContainerState::Running);
}

#[tokio::test]
async fn delete_releases_id_and_fires_exit_signal() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    let signal = sb.exit_signal("pod").await.unwrap();
    let waiter = {
        let signal = std::sync::Arc::clone(&signal);
        tokio::spawn(async move { signal.wait().await })
    };

    sb.stop("pod", false).await.unwrap();
    assert!(!signal.is_signaled());
    sb.delete("pod", false).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(signal.is_signaled());
    // A waiter arriving after the fact completes at once.
    tokio::time::timeout(Duration::from_millis(100), signal.wait())
        .await
        .unwrap();

    assert!(matches!(sb.status("pod").await, Err(SandboxError::NotFound(_))));
    assert!(matches!(sb.ping("pod").await, Err(SandboxError::NotFound(_))));
    assert!(matches!(sb.delete("pod", true).await, Err(SandboxError::NotFound(_))));

    // The id is free again.
    sb.create("pod", SandboxData::default()).await.unwrap();
    assert_eq!(sb.status("pod").await.unwrap().state, SandboxState::Created);
}

#[tokio::test]
async fn ping_succeeds_for_live_sandbox() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    sb.ping("pod").await.unwrap();
    sb.start("pod").await.unwrap();
    sb.ping("pod").await.unwrap();
    sb.stop("pod", false).await.unwrap();
    sb.ping("pod").await.unwrap();
}

#[tokio::test]
async fn container_operations() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    sb.append_container(
        "pod",
        "app",
        container_data("app", "pod", &[(MEMORY_LIMIT, "1048576")]),
    )
    .await
    .unwrap();

    let err = sb
        .append_container("pod", "app", container_data("app", "pod", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::DuplicateId(id) if id == "app"));

    sb.start_container("pod", "app").await.unwrap();
    sb.update_container(
        "pod",
        "app",
        container_data("app", "pod", &[(PID_LIMIT, "32")]),
    )
    .await
    .unwrap();

    {
        let handle = sb.sandbox("pod").await.unwrap();
        let sandbox = handle.read().await;
        let container = sandbox.container("app").unwrap();
        assert_eq!(container.state(), ContainerState::Running);
        assert_eq!(container.sandbox_id(), "pod");
        assert_eq!(container.resource_profile().pid_limit(), Some(32));
        assert_eq!(container.resource_profile().memory_limit_bytes(), None);
    }

    let err = sb
        .update_container("pod", "ghost", container_data("ghost", "pod", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::NotFound(id) if id == "ghost"));

    sb.remove_container("pod", "app").await.unwrap();
    let err = sb.remove_container("pod", "app").await.unwrap_err();
    assert!(matches!(err, SandboxError::NotFound(id) if id == "app"));
}

#[tokio::test]
async fn containers_can_be_added_to_stopped_sandbox() {
    let (_dir, sb) = sandboxer();

    sb.create("pod", SandboxData::default()).await.unwrap();
    sb.stop("pod", false).await.unwrap();
    sb.append_container("pod", "late", container_data("late", "pod", &[]))
        .await
        .unwrap();
    assert_eq!(sb.status("pod").await.unwrap().containers.len(), 1);
}

#[tokio::test]
async fn update_replaces_sandbox_profile_keeps_state() {
    let (_dir, sb) = sandboxer();

    let handle = sb
        .create("pod", sandbox_data("pod", &[(CPU_LIMIT, "1")]))
        .await
        .unwrap();
    sb.start("pod").await.unwrap();

    let data = SandboxData {
        spec: Some(spec(json!({ "cpu": { "quota": 300_000, "period": 100_000 } }))),
        ..sandbox_data("pod", &[(CPU_LIMIT, "8")])
    };
    sb.update("pod", data).await.unwrap();

    let sandbox = handle.read().await;
    assert_eq!(sandbox.state(), SandboxState::Running);
    assert_eq!(sandbox.resource_profile().cpu_limit_cores(), Some(3.0));
    assert!(sandbox.data().spec.is_some());
}

#[tokio::test]
async fn lookup_handle_matches_created_handle() {
    let (_dir, sb) = sandboxer();

    let created = sb.create("pod", SandboxData::default()).await.unwrap();
    let looked_up = sb.sandbox("pod").await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&created, &looked_up));
    assert_eq!(looked_up.read().await.id(), "pod");
}
