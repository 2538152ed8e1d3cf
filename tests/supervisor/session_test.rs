//! Tests for the install/build/restart/test cycle.

use std::path::PathBuf;
use std::sync::Arc;

use onchange::config::OnchangeConfig;
use onchange::supervisor::ChangeEvent;
use onchange::toolchain::{PackageNode, Verb};
use tempfile::TempDir;

use crate::common::{session_with, sleep_config, FakeToolchain, Outcome, RecordingWatcher};

#[cfg(unix)]
use crate::common::{pid_exists, session_for, sleep_binary};

/// Builds into a temp artifact; the fake tool never writes it, so every
/// launch fails and no real process is involved.
fn artifact_config() -> OnchangeConfig {
    OnchangeConfig {
        clear: false,
        install: false,
        test: false,
        ..OnchangeConfig::default()
    }
}

/// Artifact mode with installs on; builds produce a runnable `sleep`.
#[cfg(unix)]
fn runnable_session(
    install: bool,
) -> (Arc<FakeToolchain>, Arc<onchange::supervisor::Session>) {
    let tool = Arc::new(FakeToolchain::new().with_runnable_output(sleep_binary()));
    let watcher = Arc::new(RecordingWatcher::default());
    let config = OnchangeConfig {
        install,
        ..artifact_config()
    };
    let session = session_for("example.com/sleep", config, &tool, &watcher, &["30"]);
    (tool, session)
}

fn change(path: &str) -> ChangeEvent {
    ChangeEvent::new(path, None)
}

#[cfg(unix)]
#[tokio::test]
async fn test_initial_cycle_starts_process_even_when_nothing_installed() {
    let tool = Arc::new(FakeToolchain::new());
    tool.script(Verb::Install, Outcome::nothing());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(sleep_config(), &tool, &watcher, &["30"]);

    session.initial_cycle().await;

    let pid = session.child_id().await.expect("process started");
    assert!(pid_exists(pid));
    assert_eq!(session.stats().await.restarts, 1);

    session.shutdown().await;
    assert!(!pid_exists(pid));
    assert_eq!(session.child_id().await, None);
}

#[cfg(unix)]
#[tokio::test]
async fn test_nothing_installed_keeps_running_process() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(sleep_config(), &tool, &watcher, &["30"]);

    session.initial_cycle().await;
    let pid = session.child_id().await.unwrap();

    tool.script(Verb::Install, Outcome::nothing());
    session.handle_change(change("/src/app/README.md")).await;

    assert_eq!(session.child_id().await, Some(pid));
    assert!(pid_exists(pid));
    let stats = session.stats().await;
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.restarts, 1);

    session.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_restart_reaps_previous_process() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(sleep_config(), &tool, &watcher, &["30"]);

    session.initial_cycle().await;
    let first = session.child_id().await.unwrap();

    session.handle_change(change("/src/app/main.go")).await;
    let second = session.child_id().await.unwrap();

    assert_ne!(first, second);
    assert!(!pid_exists(first), "old process must be gone before the new one runs");
    assert!(pid_exists(second));

    session.shutdown().await;
    assert!(!pid_exists(second));
}

#[cfg(unix)]
#[tokio::test]
async fn test_concurrent_changes_run_one_cycle_at_a_time() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(sleep_config(), &tool, &watcher, &["30"]);
    session.initial_cycle().await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let session = Arc::clone(&session);
        handles.push(tokio::spawn(async move {
            session
                .handle_change(change(&format!("/src/app/file{i}.go")))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = session.stats().await;
    assert_eq!(stats.cycles, 5);
    assert_eq!(stats.restarts, 5);
    assert_eq!(tool.calls_for(Verb::Install).len(), 5);

    session.shutdown().await;
}

#[tokio::test]
async fn test_install_targets_everything_when_enabled() {
    let tool = Arc::new(FakeToolchain::new());
    tool.script(Verb::Install, Outcome::nothing());
    let watcher = Arc::new(RecordingWatcher::default());
    let config = OnchangeConfig {
        restart_command: Some("/nonexistent/onchange-server".to_string()),
        ..sleep_config()
    };
    let session = session_with(config, &tool, &watcher, &[]);

    session.initial_cycle().await;

    let installs = tool.calls_for(Verb::Install);
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].targets, vec!["all"]);
}

#[tokio::test]
async fn test_restart_command_without_install_installs_root() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let config = OnchangeConfig {
        install: false,
        restart_command: Some("/nonexistent/onchange-server".to_string()),
        ..sleep_config()
    };
    let session = session_with(config, &tool, &watcher, &[]);

    session.initial_cycle().await;

    let installs = tool.calls_for(Verb::Install);
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].targets, vec!["example.com/app"]);
    assert!(tool.calls_for(Verb::Build).is_empty());
}

#[tokio::test]
async fn test_launch_failure_is_not_fatal() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    session.initial_cycle().await;
    session.handle_change(change("/src/app/main.go")).await;

    let stats = session.stats().await;
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.launch_failures, 2);
    assert_eq!(stats.restarts, 0);
    assert_eq!(session.child_id().await, None);
}

#[tokio::test]
async fn test_build_failure_reports_and_removes_output() {
    let tool = Arc::new(FakeToolchain::new());
    tool.script(Verb::Build, Outcome::Fail("./main.go:3: undefined: x".to_string()));
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    session.initial_cycle().await;

    assert_eq!(session.child_id().await, None);
    assert_eq!(
        session.last_error().await.as_deref(),
        Some("./main.go:3: undefined: x")
    );
    let stats = session.stats().await;
    assert_eq!(stats.reported, 1);
    assert_eq!(stats.launch_failures, 0);

    let builds = tool.calls_for(Verb::Build);
    assert_eq!(builds.len(), 1);
    assert!(!builds[0].output_existed, "output path is unlinked before building");
    for output in tool.outputs() {
        assert!(!output.exists(), "{} left behind", output.display());
    }
}

#[tokio::test]
async fn test_build_output_is_named_after_package() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    session.initial_cycle().await;

    let outputs = tool.outputs();
    assert_eq!(outputs.len(), 1);
    let name = outputs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("app-"), "unexpected artifact name {name}");
    assert!(!outputs[0].exists());
}

#[tokio::test]
async fn test_repeated_failures_are_reported_once() {
    let tool = Arc::new(FakeToolchain::new());
    for stderr in ["undefined: x", "undefined: x", "undefined: y"] {
        tool.script(Verb::Build, Outcome::Fail(stderr.to_string()));
    }
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    session.initial_cycle().await;
    session.handle_change(change("/src/app/main.go")).await;
    session.handle_change(change("/src/app/main.go")).await;

    let stats = session.stats().await;
    assert_eq!(stats.reported, 2);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(session.last_error().await.as_deref(), Some("undefined: y"));
}

#[tokio::test]
async fn test_test_file_change_repeats_last_failure() {
    let tool = Arc::new(FakeToolchain::new());
    for _ in 0..3 {
        tool.script(Verb::Test, Outcome::Fail("--- FAIL: TestServe".to_string()));
    }
    let watcher = Arc::new(RecordingWatcher::default());
    let config = OnchangeConfig {
        test: true,
        ..artifact_config()
    };
    let session = session_with(config, &tool, &watcher, &[]);

    session.initial_cycle().await;
    assert_eq!(session.stats().await.reported, 1);

    session.handle_change(change("/src/app/serve_test.go")).await;
    let stats = session.stats().await;
    assert_eq!(stats.reported, 2);
    assert_eq!(stats.suppressed, 0);

    session.handle_change(change("/src/app/serve.go")).await;
    let stats = session.stats().await;
    assert_eq!(stats.reported, 2);
    assert_eq!(stats.suppressed, 1);
}

#[tokio::test]
async fn test_tests_run_for_changed_package() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let config = OnchangeConfig {
        test: true,
        ..artifact_config()
    };
    let session = session_with(config, &tool, &watcher, &[]);

    session.initial_cycle().await;
    session
        .handle_change(ChangeEvent::new(
            "/src/app/store/db.go",
            Some("example.com/app/store".to_string()),
        ))
        .await;

    let tests: Vec<Vec<String>> = tool
        .calls_for(Verb::Test)
        .into_iter()
        .map(|call| call.targets)
        .collect();
    assert_eq!(
        tests,
        vec![vec!["example.com/app"], vec!["example.com/app/store"]]
    );
}

#[tokio::test]
async fn test_start_watches_root_and_imports() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("app");
    let lib = temp.path().join("lib");
    std::fs::create_dir_all(app.join("cmd")).unwrap();
    std::fs::create_dir_all(&lib).unwrap();

    let tool = Arc::new(
        FakeToolchain::new()
            .with_package(
                PackageNode::new("example.com/app", &app)
                    .with_imports(&["fmt", "example.com/lib"])
                    .command(),
            )
            .with_package(PackageNode::new("fmt", temp.path().join("goroot/fmt")).standard())
            .with_package(PackageNode::new("example.com/lib", &lib)),
    );
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    let added = session.start().await.unwrap();

    assert_eq!(added, 3);
    assert_eq!(watcher.dirs(), vec![app.clone(), app.join("cmd"), lib.clone()]);
    assert_eq!(
        session.watch_set().package_for(&lib.join("lib.go")).as_deref(),
        Some("example.com/lib")
    );
}

#[tokio::test]
async fn test_start_fails_for_unknown_root() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    let err = session.start().await.unwrap_err();
    assert!(err.to_string().contains("example.com/app"));
    assert!(watcher.dirs().is_empty());
}

#[tokio::test]
async fn test_change_in_new_package_extends_watch_set() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("app");
    let extra = temp.path().join("extra");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::create_dir_all(&extra).unwrap();

    let tool = Arc::new(
        FakeToolchain::new().with_package(PackageNode::new("example.com/app", &app)),
    );
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);
    session.start().await.unwrap();
    assert_eq!(watcher.dirs(), vec![app.clone()]);

    tool.add_package(PackageNode::new("example.com/extra", &extra));
    session
        .handle_change(ChangeEvent::new(
            extra.join("extra.go"),
            Some("example.com/extra".to_string()),
        ))
        .await;

    assert_eq!(watcher.dirs(), vec![app, extra]);
    assert_eq!(session.watch_set().len(), 2);
}

#[tokio::test]
async fn test_change_after_shutdown_is_dropped() {
    let tool = Arc::new(FakeToolchain::new());
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);

    session.shutdown().await;
    session.handle_change(change("/src/app/main.go")).await;

    assert_eq!(session.stats().await.cycles, 0);
    assert!(tool.calls().is_empty());
    assert!(session.shutdown_token().is_cancelled());
}

#[test]
fn test_change_event_keeps_path() {
    let event = ChangeEvent::new("/src/app/main.go", None);
    assert_eq!(event.path, PathBuf::from("/src/app/main.go"));
    assert!(event.package.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_installed_change_restarts_even_when_build_is_cached() {
    let (tool, session) = runnable_session(true);
    session.initial_cycle().await;
    let first = session.child_id().await.expect("artifact started");

    tool.script(Verb::Install, Outcome::affected(&["example.com/sleep"]));
    tool.script(Verb::Build, Outcome::nothing());
    session.handle_change(change("/src/sleep/main.go")).await;

    let second = session.child_id().await.expect("artifact restarted");
    assert_ne!(first, second);
    assert!(!pid_exists(first));
    assert!(pid_exists(second));
    assert_eq!(session.stats().await.restarts, 2);

    session.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_nothing_installed_skips_build_and_restart() {
    let (tool, session) = runnable_session(true);
    session.initial_cycle().await;
    let pid = session.child_id().await.expect("artifact started");

    tool.script(Verb::Install, Outcome::nothing());
    tool.script(Verb::Build, Outcome::affected(&["example.com/sleep"]));
    session.handle_change(change("/src/sleep/README.md")).await;

    assert_eq!(session.child_id().await, Some(pid));
    assert!(pid_exists(pid));
    assert_eq!(session.stats().await.restarts, 1);
    assert_eq!(tool.calls_for(Verb::Build).len(), 1);

    session.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_zero_affected_build_keeps_running_artifact() {
    let (tool, session) = runnable_session(false);
    session.initial_cycle().await;
    let pid = session.child_id().await.expect("artifact started");

    tool.script(Verb::Build, Outcome::nothing());
    session.handle_change(change("/src/sleep/notes.txt")).await;

    assert_eq!(session.child_id().await, Some(pid));
    assert!(pid_exists(pid));
    assert_eq!(session.stats().await.restarts, 1);
    assert!(tool.calls_for(Verb::Install).is_empty());

    session.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_rebuilt_artifact_replaces_process() {
    let (tool, session) = runnable_session(false);
    session.initial_cycle().await;
    let first = session.child_id().await.expect("artifact started");

    session.handle_change(change("/src/sleep/main.go")).await;

    let second = session.child_id().await.expect("artifact restarted");
    assert_ne!(first, second);
    assert!(!pid_exists(first));
    for output in tool.outputs() {
        assert!(!output.exists(), "{} left behind", output.display());
    }

    session.shutdown().await;
}

#[tokio::test]
async fn test_reregistration_does_not_describe_standard_imports_again() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("app");
    std::fs::create_dir_all(&app).unwrap();

    let tool = Arc::new(
        FakeToolchain::new()
            .with_package(
                PackageNode::new("example.com/app", &app).with_imports(&["fmt", "net/http"]),
            )
            .with_package(PackageNode::new("fmt", temp.path().join("goroot/fmt")).standard())
            .with_package(
                PackageNode::new("net/http", temp.path().join("goroot/net/http")).standard(),
            ),
    );
    let watcher = Arc::new(RecordingWatcher::default());
    let session = session_with(artifact_config(), &tool, &watcher, &[]);
    session.start().await.unwrap();
    assert_eq!(tool.describe_count(), 3);

    session
        .handle_change(ChangeEvent::new(
            app.join("main.go"),
            Some("example.com/app".to_string()),
        ))
        .await;

    assert_eq!(tool.describe_count(), 4);
    assert!(session.watch_set().known_packages().contains("net/http"));
}
