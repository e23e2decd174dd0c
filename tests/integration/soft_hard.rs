//! Soft/hard state transitions driven through the public result queue

use vigil::dependency::DependencyResult;
use vigil::engine::{HookCall, NotificationKind};
use vigil::models::{ServiceState, StateType};

use super::helpers::*;

/// Test: a failing service retries through soft states and notifies once hard
#[test]
fn test_service_problem_becomes_hard_after_retries() {
    let mut test = TestEngine::from_yaml(WEB_YAML);
    let http = test.service("web1", "http");

    test.active_service("web1", "http", 2, "CRITICAL - connection refused", t0());
    test.active_service("web1", "http", 2, "CRITICAL - connection refused", t0() + secs(60));
    {
        let svc = test.engine.objects().service(http);
        assert_eq!(svc.state_type, StateType::Soft);
        assert_eq!(svc.current_attempt, 3);
    }
    assert!(test.service_notifications().is_empty());

    test.active_service("web1", "http", 2, "CRITICAL - connection refused", t0() + secs(120));
    let svc = test.engine.objects().service(http);
    assert_eq!(svc.current_state, ServiceState::Critical);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.plugin_output, "CRITICAL - connection refused");
    assert_eq!(
        test.service_notifications(),
        vec![HookCall::ServiceNotification {
            service: "web1/http".to_string(),
            state: ServiceState::Critical,
            kind: NotificationKind::Normal,
            dependencies: DependencyResult::Ok,
        }]
    );
}

/// Test: a single-attempt service goes hard on its first problem and
/// sends a recovery when it comes back
#[test]
fn test_single_attempt_service_notifies_problem_and_recovery() {
    let mut test = TestEngine::from_yaml(WEB_YAML);
    let disk = test.service("web1", "disk");

    test.active_service("web1", "disk", 1, "DISK WARNING - 91% used", t0());
    assert_eq!(test.engine.objects().service(disk).state_type, StateType::Hard);
    assert_eq!(test.service_notifications().len(), 1);

    test.active_service("web1", "disk", 0, "DISK OK - 40% used", t0() + secs(300));
    let svc = test.engine.objects().service(disk);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert_eq!(svc.last_hard_state, ServiceState::Ok);

    let notified: Vec<ServiceState> = test
        .service_notifications()
        .into_iter()
        .filter_map(|call| match call {
            HookCall::ServiceNotification { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(notified, vec![ServiceState::Warning, ServiceState::Ok]);
}

/// Test: a problem that clears before its retries run out never notifies
#[test]
fn test_transient_problem_stays_quiet() {
    let mut test = TestEngine::from_yaml(WEB_YAML);
    let http = test.service("web1", "http");

    test.active_service("web1", "http", 1, "HTTP WARNING - slow response", t0());
    test.active_service("web1", "http", 0, "HTTP OK", t0() + secs(60));

    let svc = test.engine.objects().service(http);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.current_attempt, 1);
    assert!(test.service_notifications().is_empty());
}

/// Test: passive results are processed like active ones and keep perfdata
#[test]
fn test_passive_service_results_are_applied() {
    let mut test = TestEngine::from_yaml(WEB_YAML);
    let disk = test.service("web1", "disk");

    test.passive_service("web1", "disk", 2, "DISK CRITICAL - 99% used | used=99%", t0());
    let svc = test.engine.objects().service(disk);
    assert_eq!(svc.current_state, ServiceState::Critical);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.plugin_output, "DISK CRITICAL - 99% used");
    assert_eq!(svc.perf_data.as_deref(), Some("used=99%"));
    assert_eq!(test.service_notifications().len(), 1);
}

/// Test: results for unknown objects are dropped without side effects
#[test]
fn test_unknown_service_result_is_discarded() {
    let mut test = TestEngine::from_yaml(WEB_YAML);
    test.engine
        .submit(vigil::models::CheckResult::passive_service("web1", "ftp", 2, "down", t0()));
    assert_eq!(test.engine.process_results(t0()), 0);
    assert!(test.hooks.calls().is_empty());
}
