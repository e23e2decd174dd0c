//! End-to-end pipeline: launch, spool, reap, process, publish

use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vigil::engine::StatusFileWriter;
use vigil::executor::{BuiltinExecutor, CommandExecutor, ExecutionOutcome, ExecutorRegistry};
use vigil::models::{CheckOptions, CheckResult, ServiceState, StateType};

use super::helpers::*;

const PIPELINE_YAML: &str = r#"
hosts:
  - name: db1
    check_command: check_dummy 0 PING OK
services:
  - host: db1
    description: postgres
    check_command: check_dummy 2 CRITICAL - port 5432 closed
  - host: db1
    description: backup
    active_checks: false
    passive_checks: true
"#;

/// Run the loop on the wall clock until at least one result was applied
fn run_until_processed(test: &mut TestEngine) -> usize {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut processed = 0;
    while processed == 0 && Instant::now() < deadline {
        processed += test.engine.run_once(Utc::now());
        if processed == 0 {
            thread::sleep(Duration::from_millis(20));
        }
    }
    processed
}

/// Test: an active check runs on a worker and its result comes back
/// through the spool
#[test]
fn test_active_check_round_trip() {
    let mut test = TestEngine::from_yaml(PIPELINE_YAML);
    let postgres = test.service("db1", "postgres");
    let now = Utc::now();
    test.engine.set_program_times(now, None);

    test.engine
        .schedule_service_check(postgres, now, CheckOptions::NONE);
    assert_eq!(test.engine.run_due_checks(now), 1);
    assert_eq!(test.engine.running_service_checks(), 1);

    assert_eq!(run_until_processed(&mut test), 1);
    let svc = test.engine.objects().service(postgres);
    assert_eq!(svc.current_state, ServiceState::Critical);
    assert_eq!(svc.state_type, StateType::Soft);
    assert_eq!(svc.plugin_output, "CRITICAL - port 5432 closed");
    assert!(!svc.is_executing);
    assert!(svc.execution_time >= 0.0);
    assert_eq!(test.engine.running_service_checks(), 0);
    // The next attempt is queued at the retry interval
    assert!(svc.next_check.is_some_and(|next| next > now));
}

/// Test: an externally committed passive result is reaped and applied
#[test]
fn test_spooled_passive_result_is_applied() {
    let mut test = TestEngine::from_yaml(PIPELINE_YAML);
    let backup = test.service("db1", "backup");
    let now = Utc::now();
    test.engine.set_program_times(now, None);

    let result = CheckResult::passive_service("db1", "backup", 1, "BACKUP WARNING - 26h old", now);
    test.engine
        .spool()
        .commit(&result, now)
        .expect("Failed to commit result");

    assert_eq!(run_until_processed(&mut test), 1);
    let svc = test.engine.objects().service(backup);
    assert_eq!(svc.current_state, ServiceState::Warning);
    assert_eq!(svc.plugin_output, "BACKUP WARNING - 26h old");
}

/// Test: a status snapshot is published after results change state
#[test]
fn test_status_published_after_processing() {
    let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
    let status_path = temp.path().join("status.json");
    let path = status_path.clone();
    let mut test = TestEngine::from_yaml_with(PIPELINE_YAML, move |config| {
        config.status_file = Some(path);
    });
    let now = Utc::now();
    test.engine.set_program_times(now, None);

    test.engine
        .spool()
        .commit(
            &CheckResult::passive_service("db1", "backup", 0, "BACKUP OK", now),
            now,
        )
        .expect("Failed to commit result");
    run_until_processed(&mut test);

    let status = StatusFileWriter::new(status_path)
        .read()
        .expect("Failed to read status file");
    assert_eq!(status["services"][1]["description"], "backup");
    assert_eq!(status["services"][1]["plugin_output"], "BACKUP OK");
    assert_eq!(status["hosts"][0]["name"], "db1");
}

/// Test: the blocking loop exits when the shutdown flag is raised and
/// records its stop time
#[test]
fn test_run_loop_stops_on_shutdown() {
    let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
    let status_path = temp.path().join("status.json");
    let path = status_path.clone();
    let mut test = TestEngine::from_yaml_with(PIPELINE_YAML, move |config| {
        config.status_file = Some(path);
    });
    test.engine.set_program_times(Utc::now(), None);

    let shutdown = test.engine.shutdown_flag();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        shutdown.store(true, Ordering::SeqCst);
    });
    test.engine.run().expect("Engine loop failed");
    stopper.join().expect("Failed to join stopper thread");

    let status = StatusFileWriter::new(status_path)
        .read()
        .expect("Failed to read status file");
    assert!(status["last_program_stop"].is_string());
    assert!(test.engine.events().len() >= 1);
}

const CUSTOM_EXECUTOR_YAML: &str = r#"
commands:
  api_probe: check_api $ARG1$
hosts:
  - name: lb1
services:
  - host: lb1
    description: api
    check_command: api_probe!/healthz
  - host: lb1
    description: legacy
    check_command: /usr/lib/plugins/check_legacy -w 5
"#;

/// Shell stand-in that answers every command line with a fixed warning
struct CannedShell;

impl CommandExecutor for CannedShell {
    fn execute(&self, command: &str, _timeout: Duration) -> anyhow::Result<ExecutionOutcome> {
        let now = Utc::now();
        Ok(ExecutionOutcome::completed(1, format!("WARNING - ran {command}"), now, now))
    }
}

/// Test: checks are routed to registered in-process plugins, and everything
/// else to the configured shell executor
#[test]
fn test_custom_executors_route_by_plugin() {
    let mut test = TestEngine::from_yaml(CUSTOM_EXECUTOR_YAML);
    let api = test.service("lb1", "api");
    let legacy = test.service("lb1", "legacy");

    let mut builtin = BuiltinExecutor::new();
    builtin.register("check_api", |args| (0, format!("API OK - {}", args.join(" "))));
    let registry = ExecutorRegistry::new(builtin).with_shell(Arc::new(CannedShell));
    test.engine = test.engine.with_executors(registry);

    let now = Utc::now();
    test.engine.set_program_times(now, None);
    test.engine.schedule_service_check(api, now, CheckOptions::NONE);
    test.engine.schedule_service_check(legacy, now, CheckOptions::NONE);
    assert_eq!(test.engine.run_due_checks(now), 2);

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut processed = 0;
    while processed < 2 && Instant::now() < deadline {
        processed += run_until_processed(&mut test);
    }
    assert_eq!(processed, 2);

    let api_svc = test.engine.objects().service(api);
    assert_eq!(api_svc.current_state, ServiceState::Ok);
    assert_eq!(api_svc.plugin_output, "API OK - /healthz");

    let legacy_svc = test.engine.objects().service(legacy);
    assert_eq!(legacy_svc.current_state, ServiceState::Warning);
    assert!(legacy_svc.plugin_output.contains("check_legacy -w 5"));
}
