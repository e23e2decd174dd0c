//! Host reachability across parent/child topologies

use vigil::engine::HookCall;
use vigil::models::{CheckTarget, HostState, ServiceState, StateType};

use super::helpers::*;

const NETWORK_YAML: &str = r#"
hosts:
  - name: core
    check_command: check_dummy 0 core alive
  - name: router-b
    parents: [core]
    check_command: check_dummy 0 router alive
  - name: router-c
    parents: [core]
    check_command: check_dummy 0 router alive
  - name: web1
    parents: [router-b, router-c]
    check_command: check_dummy 0 web alive
services:
  - host: web1
    description: http
    check_command: check_dummy 0 HTTP OK
    max_attempts: 1
"#;

fn network() -> TestEngine {
    TestEngine::from_yaml_with(NETWORK_YAML, |config| {
        config.translate_passive_host_checks = true;
    })
}

/// Test: with every parent down, a DOWN report is recorded as UNREACHABLE
#[test]
fn test_host_behind_failed_parents_is_unreachable() {
    let mut test = network();
    let web1 = test.host("web1");

    test.passive_host("router-b", 1, "no route", t0());
    test.passive_host("router-c", 1, "no route", t0());
    test.passive_host("web1", 1, "CRITICAL - host unreachable", t0() + secs(5));

    let host = test.engine.objects().host(web1);
    assert_eq!(host.current_state, HostState::Unreachable);
    assert_eq!(host.state_type, StateType::Hard);
    assert_eq!(test.engine.determine_host_reachability(web1), HostState::Unreachable);
}

/// Test: one working parent is enough for the host itself to be blamed
#[test]
fn test_host_with_live_parent_is_down() {
    let mut test = network();
    let web1 = test.host("web1");

    test.passive_host("router-b", 1, "no route", t0());
    test.passive_host("web1", 1, "CRITICAL - host unreachable", t0() + secs(5));

    assert_eq!(test.engine.objects().host(web1).current_state, HostState::Down);
    assert!(test.host_notifications().iter().any(|call| matches!(
        call,
        HookCall::HostNotification { host, state: HostState::Down, .. } if host == "web1"
    )));
}

/// Test: a parent going down queues checks of its children
#[test]
fn test_parent_outage_rechecks_children() {
    let mut test = network();
    let (router_b, router_c) = (test.host("router-b"), test.host("router-c"));

    test.passive_host("core", 1, "core switch down", t0());

    let events = test.engine.events();
    assert!(events.get(CheckTarget::Host(router_b)).is_some());
    assert!(events.get(CheckTarget::Host(router_c)).is_some());
}

/// Test: a service problem behind an unreachable host is not notified
#[test]
fn test_service_problem_masked_by_unreachable_host() {
    let mut test = network();

    test.passive_host("router-b", 1, "no route", t0());
    test.passive_host("router-c", 1, "no route", t0());
    test.passive_host("web1", 1, "host unreachable", t0() + secs(5));
    test.passive_service("web1", "http", 2, "CRITICAL - timeout", t0() + secs(10));

    let http = test.service("web1", "http");
    let svc = test.engine.objects().service(http);
    assert_eq!(svc.current_state, ServiceState::Critical);
    assert_eq!(svc.state_type, StateType::Hard);
    assert!(svc.host_problem_at_last_check);
    assert!(test.service_notifications().is_empty());
}

/// Test: without translation a passive DOWN is taken as reported
#[test]
fn test_untranslated_passive_down_is_kept() {
    let mut test = TestEngine::from_yaml(NETWORK_YAML);
    let web1 = test.host("web1");

    test.passive_host("router-b", 1, "no route", t0());
    test.passive_host("router-c", 1, "no route", t0());
    test.passive_host("web1", 1, "host unreachable", t0() + secs(5));

    assert_eq!(test.engine.objects().host(web1).current_state, HostState::Down);
}
