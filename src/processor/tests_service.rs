//! Tests for the service result state machine

use crate::dependency::{DependencyKind, ServiceDependency};
use crate::engine::fixtures::{secs, single_service_objects, t0, TestBed};
use crate::engine::{BrokerEvent, EngineHooks, HookCall, HookDecision, NotificationKind};
use crate::models::{
    AcknowledgementType, CheckOptions, CheckResult, CheckTarget, HostState, ServiceState, StateType,
};

/// Three CRITICAL results in a row, ending HARD at t0 + 120s
fn drive_to_hard_critical(bed: &mut TestBed) {
    bed.apply_service(2, "CRITICAL - refused", t0());
    bed.apply_service(2, "CRITICAL - refused", t0() + secs(60));
    bed.apply_service(2, "CRITICAL - refused", t0() + secs(120));
}

#[test]
fn test_soft_to_hard_progression() {
    let mut bed = TestBed::new();
    let id = bed.service;

    bed.apply_service(2, "CRITICAL - connection refused", t0());
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Critical);
    assert_eq!(svc.state_type, StateType::Soft);
    assert_eq!(svc.current_attempt, 2);
    assert_eq!(svc.next_check, Some(t0() + secs(60)));
    assert_eq!(bed.service_notifications(), 0);

    bed.apply_service(2, "CRITICAL - connection refused", t0() + secs(60));
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.state_type, StateType::Soft);
    assert_eq!(svc.current_attempt, 3);
    assert_eq!(svc.next_check, Some(t0() + secs(120)));
    assert_eq!(bed.service_notifications(), 0);

    bed.apply_service(2, "CRITICAL - connection refused", t0() + secs(120));
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.current_attempt, 3);
    assert_eq!(svc.last_hard_state, ServiceState::Critical);
    assert_eq!(svc.last_hard_state_change, Some(t0() + secs(120)));
    assert_eq!(svc.next_check, Some(t0() + secs(420)));
    assert_eq!(bed.service_notifications(), 1);

    let pending = bed.engine.events.get(CheckTarget::Service(id)).copied();
    assert_eq!(pending.map(|check| check.due), Some(t0() + secs(420)));
}

#[test]
fn test_hard_recovery_notifies() {
    let mut bed = TestBed::new();
    let id = bed.service;
    drive_to_hard_critical(&mut bed);

    bed.apply_service(0, "HTTP OK", t0() + secs(420));
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.current_attempt, 1);
    assert_eq!(svc.last_hard_state, ServiceState::Ok);
    assert_eq!(svc.notifications.current_number, 0);

    let recoveries: Vec<HookCall> = bed
        .hooks
        .calls()
        .into_iter()
        .filter(|call| {
            matches!(
                call,
                HookCall::ServiceNotification {
                    state: ServiceState::Ok,
                    kind: NotificationKind::Normal,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(recoveries.len(), 1);
}

#[test]
fn test_soft_recovery_is_quiet() {
    let mut bed = TestBed::new();
    let id = bed.service;

    bed.apply_service(1, "WARNING - slow", t0());
    bed.apply_service(0, "HTTP OK", t0() + secs(60));

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.current_attempt, 1);
    assert_eq!(svc.last_hard_state, ServiceState::Ok);
    assert_eq!(bed.service_notifications(), 0);
    // One handler run for the soft problem, one for the soft recovery
    assert_eq!(bed.service_event_handlers(), 2);
}

#[test]
fn test_problem_and_event_ids() {
    let mut bed = TestBed::new();
    let id = bed.service;

    bed.apply_service(2, "CRITICAL", t0());
    let ids = bed.engine.objects.service(id).ids.clone();
    assert_eq!(ids.current_event_id, 1);
    assert_eq!(ids.current_problem_id, 1);

    // Problem to problem keeps the problem id
    bed.apply_service(1, "WARNING", t0() + secs(60));
    let ids = bed.engine.objects.service(id).ids.clone();
    assert_eq!(ids.current_event_id, 2);
    assert_eq!(ids.last_event_id, 1);
    assert_eq!(ids.current_problem_id, 1);

    bed.apply_service(0, "OK", t0() + secs(120));
    let ids = bed.engine.objects.service(id).ids.clone();
    assert_eq!(ids.current_event_id, 3);
    assert_eq!(ids.current_problem_id, 0);
    assert_eq!(ids.last_problem_id, 1);
}

#[test]
fn test_host_outage_masks_service_problem() {
    let mut bed = TestBed::new();
    let (host_id, id) = (bed.host, bed.service);
    {
        let host = bed.engine.objects.host_mut(host_id);
        host.current_state = HostState::Down;
        host.last_state = HostState::Down;
        host.last_hard_state = HostState::Down;
        host.state_type = StateType::Hard;
    }

    bed.apply_service(2, "CRITICAL - no route", t0());
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.current_attempt, 1);
    assert_eq!(svc.last_hard_state, ServiceState::Critical);
    assert!(svc.host_problem_at_last_check);
    assert_eq!(bed.service_notifications(), 0);
    // The host outage is what gets reported
    assert_eq!(bed.host_notifications(), 1);

    bed.engine.objects.host_mut(host_id).current_state = HostState::Up;
    bed.apply_service(0, "HTTP OK", t0() + secs(300));
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(svc.last_hard_state_change, Some(t0() + secs(300)));
    assert!(!svc.host_problem_at_last_check);
    // No problem was ever notified, so there is no recovery to send
    assert_eq!(bed.service_notifications(), 0);
}

#[test]
fn test_retries_restart_after_host_recovers() {
    let mut bed = TestBed::new();
    let (host_id, id) = (bed.host, bed.service);
    {
        let host = bed.engine.objects.host_mut(host_id);
        host.current_state = HostState::Down;
        host.state_type = StateType::Soft;
    }

    // A soft host problem leaves the service soft without using a retry
    bed.apply_service(2, "CRITICAL", t0());
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.state_type, StateType::Soft);
    assert_eq!(svc.current_attempt, 1);

    bed.engine.objects.host_mut(host_id).current_state = HostState::Up;
    bed.engine.objects.service_mut(id).host_problem_at_last_check = true;
    bed.apply_service(2, "CRITICAL", t0() + secs(60));
    let svc = bed.engine.objects.service(id);
    assert!(!svc.host_problem_at_last_check);
    assert_eq!(svc.state_type, StateType::Soft);
    assert_eq!(svc.current_attempt, 2);
}

#[test]
fn test_passive_result_discarded_when_disabled() {
    let mut bed = TestBed::with_config(|config| config.accept_passive_service_checks = false);
    let id = bed.service;

    let result = CheckResult::passive_service("web1", "http", 2, "CRITICAL", t0());
    bed.engine.process_result(result, t0());

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert!(svc.last_check.is_none());
    assert!(!svc.has_been_checked);
}

#[test]
fn test_passive_result_follows_soft_states() {
    let mut bed = TestBed::new();
    let id = bed.service;

    let result = CheckResult::passive_service("web1", "http", 1, "WARNING - queue 80%", t0());
    assert!(bed.engine.process_result(result, t0()));

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Warning);
    assert_eq!(svc.state_type, StateType::Soft);
    assert_eq!(svc.plugin_output, "WARNING - queue 80%");
    // Passive results do not ask for a reschedule, but the state change does
    assert_eq!(svc.next_check, Some(t0() + secs(60)));
}

#[test]
fn test_freshness_result_dropped_when_fresh_again() {
    let mut bed = TestBed::new();
    let id = bed.service;
    {
        let svc = bed.engine.objects.service_mut(id);
        svc.check_freshness = true;
        svc.freshness_threshold = 300;
        svc.has_been_checked = true;
        svc.last_check = Some(t0() - secs(10));
        svc.is_being_freshened = true;
        svc.is_executing = true;
    }
    bed.engine.running_service_checks = 1;

    let mut result = bed.service_result(2, "CRITICAL - stale", t0());
    result.check_options = CheckOptions::FORCE_EXECUTION | CheckOptions::FRESHNESS_CHECK;
    bed.engine.process_result(result, t0());

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert!(!svc.is_being_freshened);
    assert!(!svc.is_executing);
    assert_eq!(bed.engine.running_service_checks, 0);
}

#[test]
fn test_out_of_bounds_return_code() {
    let mut bed = TestBed::new();
    let id = bed.service;

    bed.apply_service(127, "sh: check_http: not found", t0());
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Unknown);
    assert_eq!(
        svc.plugin_output,
        "(Return code of 127 is out of bounds - plugin may be missing : sh: check_http: not found)"
    );
}

#[test]
fn test_timed_out_check() {
    let mut bed = TestBed::new();
    let id = bed.service;

    let mut result = bed.service_result(0, "", t0());
    result.early_timeout = true;
    bed.engine.process_result(result, t0());

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Critical);
    assert_eq!(svc.plugin_output, "(Service check timed out after 0.25 seconds)");
}

#[test]
fn test_timeout_state_is_configurable() {
    let mut bed = TestBed::with_config(|config| {
        config.service_check_timeout_state = ServiceState::Unknown;
    });
    let id = bed.service;

    let mut result = bed.service_result(0, "", t0());
    result.early_timeout = true;
    bed.engine.process_result(result, t0());
    assert_eq!(bed.engine.objects.service(id).current_state, ServiceState::Unknown);
}

#[test]
fn test_empty_output_placeholder_and_long_output() {
    let mut bed = TestBed::new();
    let id = bed.service;

    bed.apply_service(0, "", t0());
    assert_eq!(
        bed.engine.objects.service(id).plugin_output,
        "(No output returned from plugin)"
    );

    bed.apply_service(0, "OK; 200\nbody ok|time=0.1s", t0() + secs(300));
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.plugin_output, "OK: 200");
    assert_eq!(svc.long_output.as_deref(), Some("body ok"));
    assert_eq!(svc.perf_data.as_deref(), Some("time=0.1s"));
}

#[test]
fn test_volatile_service_reruns_handler() {
    let mut bed = TestBed::new();
    bed.engine.objects.service_mut(bed.service).is_volatile = true;
    drive_to_hard_critical(&mut bed);
    assert_eq!(bed.service_event_handlers(), 3);

    bed.apply_service(2, "CRITICAL - refused", t0() + secs(420));
    assert_eq!(bed.service_event_handlers(), 4);
}

#[test]
fn test_steady_hard_problem_skips_handler() {
    let mut bed = TestBed::new();
    drive_to_hard_critical(&mut bed);
    bed.apply_service(2, "CRITICAL - refused", t0() + secs(420));
    assert_eq!(bed.service_event_handlers(), 3);
}

#[test]
fn test_normal_ack_cleared_on_problem_change() {
    let mut bed = TestBed::new();
    let id = bed.service;
    drive_to_hard_critical(&mut bed);
    bed.engine.objects.service_mut(id).acknowledgement = AcknowledgementType::Normal;

    bed.apply_service(1, "WARNING", t0() + secs(420));
    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.acknowledgement, AcknowledgementType::None);
    assert_eq!(svc.state_type, StateType::Hard);
    assert_eq!(bed.service_notifications(), 2);
}

#[test]
fn test_sticky_ack_survives_until_recovery() {
    let mut bed = TestBed::new();
    let id = bed.service;
    drive_to_hard_critical(&mut bed);
    bed.engine.objects.service_mut(id).acknowledgement = AcknowledgementType::Sticky;

    bed.apply_service(1, "WARNING", t0() + secs(420));
    assert_eq!(
        bed.engine.objects.service(id).acknowledgement,
        AcknowledgementType::Sticky
    );
    // Acknowledged problems do not notify
    assert_eq!(bed.service_notifications(), 1);

    bed.apply_service(0, "OK", t0() + secs(720));
    assert_eq!(
        bed.engine.objects.service(id).acknowledgement,
        AcknowledgementType::None
    );
}

#[test]
fn test_predictive_check_of_masters() {
    let (mut objects, host, http) = single_service_objects();
    let db = objects.add_service(host, "db").unwrap();
    objects.add_service_dependency(ServiceDependency::new(http, db, DependencyKind::Execution));
    let mut bed = TestBed::with_objects(objects, host, http, |_| {});

    bed.apply_service(2, "CRITICAL", t0());
    assert!(bed.engine.events.get(CheckTarget::Service(db)).is_none());

    // The attempt that reaches max_attempts refreshes the master
    bed.apply_service(2, "CRITICAL", t0() + secs(60));
    let pending = bed.engine.events.get(CheckTarget::Service(db)).copied();
    let pending = pending.expect("master check should be queued");
    assert_eq!(pending.due, t0() + secs(60));
    assert_eq!(pending.options, CheckOptions::DEPENDENCY_CHECK);
}

#[test]
fn test_first_host_check_requested() {
    let mut bed = TestBed::new();
    let host_id = bed.host;
    {
        let host = bed.engine.objects.host_mut(host_id);
        host.has_been_checked = false;
        host.last_check = None;
    }

    bed.apply_service(0, "HTTP OK", t0());
    let pending = bed.engine.events.get(CheckTarget::Host(host_id)).copied();
    let pending = pending.expect("host check should be queued");
    assert_eq!(pending.due, t0());
    assert_eq!(pending.options, CheckOptions::DEPENDENCY_CHECK);
}

#[test]
fn test_flapping_detected_from_alternating_results() {
    let mut bed = TestBed::with_config(|config| {
        config.low_service_flap_threshold = 5.0;
        config.high_service_flap_threshold = 20.0;
    });
    let id = bed.service;
    bed.engine.objects.service_mut(id).max_attempts = 1;

    let mut at = t0();
    for round in 0..6 {
        let code = if round % 2 == 0 { 2 } else { 0 };
        bed.apply_service(code, "flip", at);
        at += secs(300);
    }

    let svc = bed.engine.objects.service(id);
    assert!(svc.flapping.is_flapping);
    assert!(svc.flapping.percent_state_change >= 20.0);
    assert!(bed.hooks.calls().iter().any(|call| matches!(
        call,
        HookCall::ServiceNotification {
            kind: NotificationKind::FlappingStart,
            ..
        }
    )));
}

/// Broker that drops service results, or replaces them when given a
/// substitute
struct ResultBroker {
    substitute: Option<CheckResult>,
}

impl EngineHooks for ResultBroker {
    fn broker(&mut self, event: BrokerEvent<'_>) -> HookDecision {
        match event {
            BrokerEvent::ServiceResult { .. } => match &self.substitute {
                Some(result) => HookDecision::Override {
                    substitute: Some(result.clone()),
                },
                None => HookDecision::Cancel,
            },
            _ => HookDecision::Proceed,
        }
    }
}

#[test]
fn test_broker_cancel_releases_running_check() {
    let mut bed = TestBed::new();
    let id = bed.service;
    bed.engine.hooks = Box::new(ResultBroker { substitute: None });
    bed.engine.objects.service_mut(id).is_executing = true;
    bed.engine.running_service_checks = 1;

    let result = bed.service_result(2, "CRITICAL", t0());
    assert!(!bed.engine.process_result(result, t0()));

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Ok);
    assert!(!svc.is_executing);
    assert_eq!(bed.engine.running_service_checks, 0);
    let pending = bed.engine.events.get(CheckTarget::Service(id)).copied();
    assert_eq!(pending.map(|check| check.due), Some(t0() + secs(300)));
}

#[test]
fn test_broker_substitute_is_processed() {
    let mut bed = TestBed::new();
    let id = bed.service;
    let substitute = bed.service_result(1, "WARNING - from broker", t0());
    bed.engine.hooks = Box::new(ResultBroker {
        substitute: Some(substitute),
    });

    let result = bed.service_result(2, "CRITICAL", t0());
    assert!(bed.engine.process_result(result, t0()));

    let svc = bed.engine.objects.service(id);
    assert_eq!(svc.current_state, ServiceState::Warning);
    assert_eq!(svc.plugin_output, "WARNING - from broker");
}

#[test]
fn test_unknown_target_is_discarded() {
    let mut bed = TestBed::new();
    let result = CheckResult::for_service("web1", "smtp", t0());
    assert!(!bed.engine.process_result(result, t0()));
    let result = CheckResult::for_host("db9", t0());
    assert!(!bed.engine.process_result(result, t0()));
}
