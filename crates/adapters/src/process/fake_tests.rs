use super::*;

#[tokio::test]
async fn spawn_assigns_increasing_pids() {
    let adapter = FakeProcessAdapter::new();
    let a = adapter.spawn(&LaunchSpec::new("purge")).await.unwrap();
    let b = adapter.spawn(&LaunchSpec::new("stats")).await.unwrap();
    assert!(b.pid > a.pid);
    assert_eq!(adapter.running_pids(), vec![a.pid, b.pid]);
    assert_eq!(adapter.spec(b.pid).unwrap().program.to_str(), Some("stats"));
}

#[tokio::test]
async fn exit_delivers_code() {
    let adapter = FakeProcessAdapter::new();
    let spawned = adapter.spawn(&LaunchSpec::new("purge")).await.unwrap();
    assert!(adapter.exit(spawned.pid, 3));
    assert_eq!(spawned.exit.await.unwrap(), ProcessExit::code(3));
    assert!(!adapter.exit(spawned.pid, 0));
    assert!(adapter.running_pids().is_empty());
}

#[tokio::test]
async fn kill_reports_signal() {
    let adapter = FakeProcessAdapter::new();
    let spawned = adapter.spawn(&LaunchSpec::new("purge")).await.unwrap();
    adapter.kill(spawned.pid).await.unwrap();
    let exit = spawned.exit.await.unwrap();
    assert_eq!(exit.signal, Some(9));
    assert!(!exit.success());
}

#[tokio::test]
async fn kill_unknown_pid_is_not_found() {
    let adapter = FakeProcessAdapter::new();
    let err = adapter.kill(42).await.unwrap_err();
    assert!(matches!(err, ProcessError::NotFound(42)));
}

#[tokio::test]
async fn ignored_kill_leaves_process_running() {
    let adapter = FakeProcessAdapter::new();
    adapter.set_ignore_kill(true);
    let spawned = adapter.spawn(&LaunchSpec::new("purge")).await.unwrap();
    adapter.kill(spawned.pid).await.unwrap();
    assert_eq!(adapter.running_pids(), vec![spawned.pid]);
}

#[tokio::test]
async fn spawn_error_is_returned_and_recorded() {
    let adapter = FakeProcessAdapter::new();
    adapter.set_spawn_error(Some("no such file"));
    let err = adapter.spawn(&LaunchSpec::new("missing")).await.unwrap_err();
    assert!(err.to_string().contains("no such file"));
    assert_eq!(adapter.spawned().len(), 1);
    assert!(adapter.running_pids().is_empty());
}

#[tokio::test]
async fn lost_process_drops_exit_sender() {
    let adapter = FakeProcessAdapter::new();
    let spawned = adapter.spawn(&LaunchSpec::new("purge")).await.unwrap();
    assert!(adapter.lose(spawned.pid));
    assert!(spawned.exit.await.is_err());
}

#[tokio::test]
async fn held_spawns_wait_for_release() {
    let adapter = FakeProcessAdapter::new();
    adapter.hold_spawns();

    let spawning = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.spawn(&LaunchSpec::new("purge")).await })
    };
    for _ in 0..200 {
        if adapter.held_spawns() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(adapter.held_spawns(), 1);
    assert!(adapter.calls().is_empty());

    adapter.release_spawns();
    let spawned = spawning.await.unwrap().unwrap();
    assert_eq!(adapter.held_spawns(), 0);
    assert_eq!(adapter.running_pids(), vec![spawned.pid]);
}
