//! Freshness checking of passively monitored services

use vigil::models::{CheckOptions, CheckTarget, ServiceState};

use super::helpers::*;

const PASSIVE_YAML: &str = r#"
hosts:
  - name: batch1
    check_command: check_dummy 0 PING OK
services:
  - host: batch1
    description: nightly-job
    check_command: check_dummy 3 UNKNOWN - no report received
    active_checks: false
    check_freshness: true
    freshness_threshold: 600
    max_attempts: 1
"#;

/// Test: a passive service is left alone while reports keep arriving and
/// gets a forced check once they stop
#[test]
fn test_stale_passive_service_is_forced() {
    let mut test = TestEngine::from_yaml(PASSIVE_YAML);
    let job = test.service("batch1", "nightly-job");

    test.passive_service("batch1", "nightly-job", 0, "JOB OK - finished in 42m", t0());
    assert!(test.engine.is_service_result_fresh(job, t0() + secs(599), false));
    assert_eq!(test.engine.check_service_result_freshness(t0() + secs(300)), 0);

    assert_eq!(test.engine.check_service_result_freshness(t0() + secs(601)), 1);
    let pending = test
        .engine
        .events()
        .get(CheckTarget::Service(job))
        .copied()
        .expect("Failed to find forced check");
    assert_eq!(pending.due, t0() + secs(601));
    assert_eq!(
        pending.options,
        CheckOptions::FORCE_EXECUTION | CheckOptions::FRESHNESS_CHECK
    );
    assert!(test.engine.objects().service(job).is_being_freshened);
}

/// Test: a report arriving while the freshness check is queued makes the
/// service fresh again
#[test]
fn test_late_report_restores_freshness() {
    let mut test = TestEngine::from_yaml(PASSIVE_YAML);
    let job = test.service("batch1", "nightly-job");

    test.passive_service("batch1", "nightly-job", 0, "JOB OK", t0());
    test.engine.check_service_result_freshness(t0() + secs(700));

    test.passive_service("batch1", "nightly-job", 0, "JOB OK - late", t0() + secs(710));
    assert!(test.engine.is_service_result_fresh(job, t0() + secs(720), false));
    let svc = test.engine.objects().service(job);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert_eq!(svc.plugin_output, "JOB OK - late");
}

/// Test: a passive service never reported since startup goes stale one
/// threshold after the engine started
#[test]
fn test_unreported_service_measured_from_startup() {
    let mut test = TestEngine::from_yaml(PASSIVE_YAML);
    let job = test.service("batch1", "nightly-job");
    test.engine.set_program_times(t0(), None);

    assert!(test.engine.is_service_result_fresh(job, t0() + secs(600), false));
    assert!(!test.engine.is_service_result_fresh(job, t0() + secs(601), false));
}

/// Test: freshness checking can be switched off globally
#[test]
fn test_freshness_disabled_globally() {
    let mut test = TestEngine::from_yaml_with(PASSIVE_YAML, |config| {
        config.check_service_freshness = false;
    });
    let job = test.service("batch1", "nightly-job");
    test.passive_service("batch1", "nightly-job", 0, "JOB OK", t0());
    assert_eq!(test.engine.check_service_result_freshness(t0() + secs(3600)), 0);
    assert!(test.engine.events().get(CheckTarget::Service(job)).is_none());
}
