//! Time periods from object definitions and their effect on scheduling

use chrono::{TimeZone, Utc};

use vigil::models::{CheckOptions, CheckTarget};

use super::helpers::*;

const PERIODS_YAML: &str = r#"
timeperiods:
  - name: workhours
    alias: Office hours
    weekdays:
      monday: "09:00-17:00"
      tuesday: "09:00-17:00"
      wednesday: "09:00-17:00"
      thursday: "09:00-17:00"
      friday: "09:00-17:00"
    exceptions:
      - "2024-03-08 00:00-00:00"
    exclude: [lunch]
  - name: lunch
    weekdays:
      monday: "12:00-13:00"
      tuesday: "12:00-13:00"
      wednesday: "12:00-13:00"
      thursday: "12:00-13:00"
      friday: "12:00-13:00"
hosts:
  - name: app1
    check_command: check_dummy 0 PING OK
services:
  - host: app1
    description: report
    check_command: check_dummy 0 REPORT OK
    check_period: workhours
"#;

fn at(day: u32, hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
}

/// Test: weekly hours, calendar exceptions and exclusions combine
#[test]
fn test_period_membership_from_definitions() {
    let test = TestEngine::from_yaml(PERIODS_YAML);
    let periods = test.engine.periods();
    let workhours = periods.find("workhours").expect("Failed to find period");

    // Monday lunch is carved out by the exclusion
    assert!(!periods.is_time_in_period(at(4, 12, 30), Some(workhours)));
    assert!(periods.is_time_in_period(at(4, 13, 0), Some(workhours)));
    assert!(!periods.is_time_in_period(at(4, 18, 0), Some(workhours)));
    // The Friday exception leaves no hours at all
    assert!(!periods.is_time_in_period(at(8, 10, 0), Some(workhours)));

    let evening = at(7, 18, 0);
    assert_eq!(
        periods.next_valid_time(evening, Some(workhours), evening),
        at(11, 9, 0)
    );
}

/// Test: a check that comes due outside its period is moved to the next
/// time the period allows
#[test]
fn test_check_outside_period_is_moved() {
    let mut test = TestEngine::from_yaml(PERIODS_YAML);
    let report = test.service("app1", "report");
    let evening = at(4, 18, 0);

    test.engine
        .schedule_service_check(report, evening, CheckOptions::NONE);
    assert_eq!(test.engine.run_due_checks(evening), 0);

    let tuesday_morning = at(5, 9, 0);
    assert_eq!(
        test.engine.objects().service(report).next_check,
        Some(tuesday_morning)
    );
    let pending = test
        .engine
        .events()
        .get(CheckTarget::Service(report))
        .copied()
        .expect("Failed to find rescheduled check");
    assert_eq!(pending.due, tuesday_morning);
}

/// Test: initial scheduling respects the check period
#[test]
fn test_initial_check_waits_for_period() {
    let mut test = TestEngine::from_yaml(PERIODS_YAML);
    let report = test.service("app1", "report");

    test.engine.schedule_initial_checks(at(9, 10, 0));
    let pending = test
        .engine
        .events()
        .get(CheckTarget::Service(report))
        .copied()
        .expect("Failed to find initial check");
    assert!(pending.due >= at(11, 9, 0));
}

/// Test: referencing an unknown period is rejected at load time
#[test]
fn test_unknown_period_is_rejected() {
    let yaml = PERIODS_YAML.replace("check_period: workhours", "check_period: weekends");
    let definitions =
        vigil::objects::ObjectDefinitions::from_yaml(&yaml).expect("Failed to parse YAML");
    assert!(definitions.build(vigil::timeperiod::Calendar::Utc).is_err());
}
