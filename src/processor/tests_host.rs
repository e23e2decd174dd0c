//! Tests for host results and reachability

use crate::dependency::{DependencyKind, HostDependency};
use crate::engine::fixtures::{secs, single_service_objects, t0, TestBed};
use crate::engine::HookCall;
use crate::models::{CheckOptions, CheckResult, CheckTarget, HostId, HostState, StateType};
use crate::objects::ObjectStore;

/// `web1` behind two routers, `router-b` and `router-c`
struct Network {
    bed: TestBed,
    router_b: HostId,
    router_c: HostId,
}

fn network(configure: impl FnOnce(&mut crate::config::EngineConfig)) -> Network {
    let (mut objects, web1, http) = single_service_objects();
    let router_b = add_checked_host(&mut objects, "router-b", "check_dummy 0 up");
    let router_c = add_checked_host(&mut objects, "router-c", "check_dummy 2 no route");
    objects.add_parent(web1, router_b);
    objects.add_parent(web1, router_c);
    Network {
        bed: TestBed::with_objects(objects, web1, http, configure),
        router_b,
        router_c,
    }
}

fn add_checked_host(objects: &mut ObjectStore, name: &str, command: &str) -> HostId {
    let id = objects.add_host(name).unwrap();
    objects.host_mut(id).check_command = Some(command.to_string());
    id
}

fn mark_hard_down(bed: &mut TestBed, id: HostId) {
    let host = bed.engine.objects.host_mut(id);
    host.current_state = HostState::Down;
    host.last_state = HostState::Down;
    host.last_hard_state = HostState::Down;
    host.state_type = StateType::Hard;
}

fn host_notification_states(bed: &TestBed, name: &str) -> Vec<HostState> {
    bed.hooks
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            HookCall::HostNotification { host, state, .. } if host == name => Some(state),
            _ => None,
        })
        .collect()
}

#[test]
fn test_soft_attempts_then_hard_down() {
    let mut bed = TestBed::new();
    let id = bed.host;

    bed.check_host(id, 2, "CRITICAL - host unreachable", t0());
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Down);
    assert_eq!(host.state_type, StateType::Soft);
    assert_eq!(host.current_attempt, 1);
    assert_eq!(host.next_check, Some(t0() + secs(60)));

    bed.check_host(id, 2, "CRITICAL - host unreachable", t0() + secs(60));
    let host = bed.engine.objects.host(id);
    assert_eq!(host.state_type, StateType::Soft);
    assert_eq!(host.current_attempt, 2);
    assert_eq!(host.next_check, Some(t0() + secs(120)));
    assert_eq!(bed.host_notifications(), 0);

    bed.check_host(id, 2, "CRITICAL - host unreachable", t0() + secs(120));
    let host = bed.engine.objects.host(id);
    assert_eq!(host.state_type, StateType::Hard);
    assert_eq!(host.current_attempt, 3);
    assert_eq!(host.last_hard_state_change, Some(t0() + secs(120)));
    assert_eq!(host.next_check, Some(t0() + secs(420)));
    assert_eq!(host_notification_states(&bed, "web1"), vec![HostState::Down]);
}

#[test]
fn test_hard_recovery_resets_attempts() {
    let mut bed = TestBed::new();
    let id = bed.host;
    for step in 0..3 {
        bed.check_host(id, 2, "DOWN", t0() + secs(60 * step));
    }

    bed.check_host(id, 0, "PING OK", t0() + secs(420));
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Up);
    assert_eq!(host.state_type, StateType::Hard);
    assert_eq!(host.current_attempt, 1);
    assert_eq!(host.ids.current_problem_id, 0);
    assert_eq!(
        host_notification_states(&bed, "web1"),
        vec![HostState::Down, HostState::Up]
    );
}

#[test]
fn test_soft_recovery_does_not_notify() {
    let mut bed = TestBed::new();
    let id = bed.host;

    bed.check_host(id, 2, "DOWN", t0());
    bed.check_host(id, 0, "UP", t0() + secs(60));
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Up);
    assert_eq!(host.state_type, StateType::Soft);
    assert_eq!(host.current_attempt, 1);
    assert_eq!(bed.host_notifications(), 0);
}

#[test]
fn test_down_when_any_parent_is_up() {
    let Network {
        mut bed,
        router_b,
        router_c,
    } = network(|_| {});
    mark_hard_down(&mut bed, router_c);
    let id = bed.host;

    bed.check_host(id, 2, "CRITICAL", t0());
    assert_eq!(bed.engine.objects.host(id).current_state, HostState::Down);

    // The UP parent is re-verified, the DOWN one is left alone
    let pending = bed.engine.events.get(CheckTarget::Host(router_b)).copied();
    assert_eq!(
        pending.map(|check| check.options),
        Some(CheckOptions::DEPENDENCY_CHECK)
    );
    assert!(bed.engine.events.get(CheckTarget::Host(router_c)).is_none());
}

#[test]
fn test_unreachable_when_all_parents_down() {
    let Network {
        mut bed,
        router_b,
        router_c,
    } = network(|_| {});
    mark_hard_down(&mut bed, router_b);
    mark_hard_down(&mut bed, router_c);
    let id = bed.host;

    bed.check_host(id, 2, "CRITICAL", t0());
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Unreachable);
    assert_eq!(host.state_type, StateType::Soft);
}

#[test]
fn test_reachability_of_host_without_parents() {
    let mut bed = TestBed::new();
    let id = bed.host;
    assert_eq!(bed.engine.determine_host_reachability(id), HostState::Up);

    bed.engine.objects.host_mut(id).current_state = HostState::Down;
    assert_eq!(bed.engine.determine_host_reachability(id), HostState::Down);
}

#[test]
fn test_single_attempt_host_checks_parents_serially() {
    let Network {
        mut bed,
        router_b,
        router_c,
    } = network(|_| {});
    let id = bed.host;
    bed.engine.objects.host_mut(id).max_attempts = 1;
    bed.engine.objects.host_mut(router_b).check_command =
        Some("check_dummy 2 router down".to_string());

    bed.check_host(id, 2, "CRITICAL", t0());

    for router in [router_b, router_c] {
        let parent = bed.engine.objects.host(router);
        assert_eq!(parent.current_state, HostState::Down);
        assert_eq!(parent.last_check, Some(t0()));
        assert!(!parent.is_executing);
    }
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Unreachable);
    assert_eq!(host.state_type, StateType::Hard);
    assert_eq!(bed.engine.running_host_checks, 0);
    assert_eq!(
        host_notification_states(&bed, "web1"),
        vec![HostState::Unreachable]
    );
}

#[test]
fn test_single_attempt_host_down_behind_live_parent() {
    let Network { mut bed, .. } = network(|_| {});
    let id = bed.host;
    bed.engine.objects.host_mut(id).max_attempts = 1;

    // router-b answers UP, so the failure is the host's own
    bed.check_host(id, 2, "CRITICAL", t0());
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Down);
    assert_eq!(host.state_type, StateType::Hard);
}

#[test]
fn test_recovery_rechecks_children() {
    let (mut objects, web1, http) = single_service_objects();
    let app = add_checked_host(&mut objects, "app", "check_dummy 0");
    objects.add_parent(app, web1);
    let mut bed = TestBed::with_objects(objects, web1, http, |_| {});
    mark_hard_down(&mut bed, web1);
    mark_hard_down(&mut bed, app);

    bed.check_host(web1, 0, "PING OK", t0());
    assert_eq!(bed.engine.objects.host(web1).current_state, HostState::Up);
    let pending = bed.engine.events.get(CheckTarget::Host(app)).copied();
    let pending = pending.expect("child check should be queued");
    assert_eq!(pending.due, t0());
    assert_eq!(pending.options, CheckOptions::DEPENDENCY_CHECK);
}

#[test]
fn test_going_down_rechecks_children() {
    let (mut objects, web1, http) = single_service_objects();
    let app = add_checked_host(&mut objects, "app", "check_dummy 0");
    objects.add_parent(app, web1);
    let mut bed = TestBed::with_objects(objects, web1, http, |_| {});

    bed.check_host(web1, 2, "DOWN", t0());
    let pending = bed.engine.events.get(CheckTarget::Host(app)).copied();
    assert_eq!(pending.map(|check| check.options), Some(CheckOptions::NONE));
}

#[test]
fn test_predictive_check_of_host_masters() {
    let (mut objects, web1, http) = single_service_objects();
    let switch = add_checked_host(&mut objects, "switch", "check_dummy 0");
    objects.add_host_dependency(HostDependency::new(web1, switch, DependencyKind::Notification));
    let mut bed = TestBed::with_objects(objects, web1, http, |_| {});
    bed.engine.objects.host_mut(web1).max_attempts = 2;

    bed.check_host(web1, 2, "DOWN", t0());
    let pending = bed.engine.events.get(CheckTarget::Host(switch)).copied();
    assert_eq!(pending.map(|check| check.due), Some(t0()));
}

#[test]
fn test_host_without_command_is_assumed_up() {
    let mut bed = TestBed::new();
    let id = bed.host;
    bed.engine.objects.host_mut(id).check_command = None;

    bed.check_host(id, 2, "", t0());
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Up);
    assert_eq!(host.plugin_output, "(Host assumed to be UP)");
}

#[test]
fn test_warning_counts_as_up_unless_aggressive() {
    let mut bed = TestBed::new();
    let id = bed.host;
    bed.check_host(id, 1, "PING WARNING - 40% loss", t0());
    assert_eq!(bed.engine.objects.host(id).current_state, HostState::Up);

    let mut bed = TestBed::with_config(|config| config.use_aggressive_host_checking = true);
    let id = bed.host;
    bed.check_host(id, 1, "PING WARNING - 40% loss", t0());
    assert_eq!(bed.engine.objects.host(id).current_state, HostState::Down);
}

#[test]
fn test_host_timeout_output() {
    let mut bed = TestBed::new();
    let id = bed.host;
    let mut result = CheckResult::for_host("web1", t0());
    result.early_timeout = true;
    result.finish_time = t0() + secs(30);
    bed.engine.handle_host_result(id, result, t0() + secs(30));

    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Down);
    assert_eq!(host.plugin_output, "(Host check timed out after 30.00 seconds)");
}

/// Passive DOWN result for `web1` with every parent down, under each
/// combination of the two passive host options
#[test]
fn test_passive_host_option_matrix() {
    let cases = [
        // (soft, translate, state, state type)
        (false, false, HostState::Down, StateType::Hard),
        (false, true, HostState::Unreachable, StateType::Hard),
        (true, false, HostState::Down, StateType::Soft),
        (true, true, HostState::Unreachable, StateType::Soft),
    ];

    for (soft, translate, expected_state, expected_type) in cases {
        let Network {
            mut bed,
            router_b,
            router_c,
        } = network(|config| {
            config.passive_host_checks_are_soft = soft;
            config.translate_passive_host_checks = translate;
        });
        mark_hard_down(&mut bed, router_b);
        mark_hard_down(&mut bed, router_c);
        let id = bed.host;

        let result = CheckResult::passive_host("web1", 1, "DOWN (submitted)", t0());
        assert!(bed.engine.process_result(result, t0()));

        let host = bed.engine.objects.host(id);
        assert_eq!(
            (host.current_state, host.state_type),
            (expected_state, expected_type),
            "soft={} translate={}",
            soft,
            translate
        );
        assert_eq!(host.current_attempt, 1);
    }
}

#[test]
fn test_passive_unreachable_is_kept() {
    let mut bed = TestBed::with_config(|config| config.translate_passive_host_checks = true);
    let id = bed.host;

    let result = CheckResult::passive_host("web1", 2, "UNREACHABLE (submitted)", t0());
    bed.engine.process_result(result, t0());
    assert_eq!(
        bed.engine.objects.host(id).current_state,
        HostState::Unreachable
    );
}

#[test]
fn test_passive_host_result_discarded_when_disabled() {
    let mut bed = TestBed::new();
    let id = bed.host;
    bed.engine.objects.host_mut(id).accept_passive_checks = false;

    let result = CheckResult::passive_host("web1", 1, "DOWN", t0());
    bed.engine.process_result(result, t0());
    let host = bed.engine.objects.host(id);
    assert_eq!(host.current_state, HostState::Up);
    assert_eq!(host.last_check, Some(t0() - secs(60)));
}
