//! Shared setup for engine integration tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use vigil::config::EngineConfig;
use vigil::engine::{HookCall, RecordingHooks};
use vigil::models::{CheckResult, HostId, ServiceId};
use vigil::objects::ObjectDefinitions;
use vigil::timeperiod::Calendar;
use vigil::Engine;

/// Monday 2024-03-04 12:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// An engine built from YAML definitions, recording every hook call
pub struct TestEngine {
    pub engine: Engine,
    pub hooks: RecordingHooks,
    pub dir: TempDir,
}

impl TestEngine {
    pub fn from_yaml(yaml: &str) -> Self {
        Self::from_yaml_with(yaml, |_| {})
    }

    pub fn from_yaml_with(yaml: &str, configure: impl FnOnce(&mut EngineConfig)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = EngineConfig {
            check_result_path: dir.path().join("spool"),
            calendar: Calendar::Utc,
            ..Default::default()
        };
        configure(&mut config);

        let definitions = ObjectDefinitions::from_yaml(yaml).expect("Failed to parse definitions");
        let (objects, periods) = definitions
            .build(config.calendar)
            .expect("Failed to build objects");
        let hooks = RecordingHooks::new();
        let mut engine = Engine::new(config, objects, periods)
            .expect("Failed to create engine")
            .with_hooks(hooks.clone());
        engine.set_program_times(t0() - Duration::hours(1), None);

        Self { engine, hooks, dir }
    }

    pub fn host(&self, name: &str) -> HostId {
        self.engine
            .objects()
            .find_host(name)
            .expect("Failed to find host")
    }

    pub fn service(&self, host: &str, description: &str) -> ServiceId {
        self.engine
            .objects()
            .find_service(host, description)
            .expect("Failed to find service")
    }

    /// Queue an active service result finishing at `at` and process it
    pub fn active_service(&mut self, host: &str, service: &str, code: i32, output: &str, at: DateTime<Utc>) {
        let mut result = CheckResult::for_service(host, service, at);
        result.return_code = code;
        result.output = output.to_string();
        result.finish_time = at + Duration::milliseconds(100);
        self.engine.submit(result);
        assert_eq!(self.engine.process_results(at), 1);
    }

    pub fn passive_service(&mut self, host: &str, service: &str, code: i32, output: &str, at: DateTime<Utc>) {
        self.engine
            .submit(CheckResult::passive_service(host, service, code, output, at));
        self.engine.process_results(at);
    }

    pub fn passive_host(&mut self, host: &str, code: i32, output: &str, at: DateTime<Utc>) {
        self.engine
            .submit(CheckResult::passive_host(host, code, output, at));
        self.engine.process_results(at);
    }

    pub fn service_notifications(&self) -> Vec<HookCall> {
        self.hooks
            .calls()
            .into_iter()
            .filter(|call| matches!(call, HookCall::ServiceNotification { .. }))
            .collect()
    }

    pub fn host_notifications(&self) -> Vec<HookCall> {
        self.hooks
            .calls()
            .into_iter()
            .filter(|call| matches!(call, HookCall::HostNotification { .. }))
            .collect()
    }
}

/// One host with two services, all checked by the builtin dummy plugin
pub const WEB_YAML: &str = r#"
hosts:
  - name: web1
    address: 10.0.0.10
    check_command: check_dummy 0 PING OK
services:
  - host: web1
    description: http
    check_command: check_dummy 0 HTTP OK
    max_attempts: 3
  - host: web1
    description: disk
    check_command: check_dummy 0 DISK OK
    max_attempts: 1
"#;
