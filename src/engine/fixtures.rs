//! Engine setup shared by unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use super::{Engine, HookCall, RecordingHooks};
use crate::config::EngineConfig;
use crate::models::{CheckResult, CheckTarget, HostId, ServiceId};
use crate::objects::ObjectStore;
use crate::timeperiod::{Calendar, TimePeriods};

/// Monday 2024-03-04 12:00 UTC
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
}

pub(crate) fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// One host `web1` with one service `http`, both checked by `check_dummy`
pub(crate) fn single_service_objects() -> (ObjectStore, HostId, ServiceId) {
    let mut objects = ObjectStore::new();
    let host = objects.add_host("web1").unwrap();
    let service = objects.add_service(host, "http").unwrap();
    objects.host_mut(host).check_command = Some("check_dummy 0 alive".to_string());
    objects.service_mut(service).check_command = Some("check_dummy 0 fine".to_string());
    (objects, host, service)
}

pub(crate) struct TestBed {
    pub(crate) engine: Engine,
    pub(crate) hooks: RecordingHooks,
    pub(crate) host: HostId,
    pub(crate) service: ServiceId,
    _dir: TempDir,
}

impl TestBed {
    pub(crate) fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub(crate) fn with_config(configure: impl FnOnce(&mut EngineConfig)) -> Self {
        let (objects, host, service) = single_service_objects();
        Self::with_objects(objects, host, service, configure)
    }

    /// The host starts out checked and UP so service results are not
    /// mixed up with a first host check
    pub(crate) fn with_objects(
        objects: ObjectStore,
        host: HostId,
        service: ServiceId,
        configure: impl FnOnce(&mut EngineConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig {
            check_result_path: dir.path().join("spool"),
            calendar: Calendar::Utc,
            ..Default::default()
        };
        configure(&mut config);

        let hooks = RecordingHooks::new();
        let mut engine = Engine::new(config, objects, TimePeriods::new(Calendar::Utc))
            .unwrap()
            .with_hooks(hooks.clone());
        engine.set_program_times(t0() - Duration::hours(1), None);
        for id in engine.objects.host_ids().collect::<Vec<_>>() {
            let h = engine.objects.host_mut(id);
            h.has_been_checked = true;
            h.last_check = Some(t0() - Duration::minutes(1));
        }

        Self {
            engine,
            hooks,
            host,
            service,
            _dir: dir,
        }
    }

    /// An active result for the test service
    pub(crate) fn service_result(&self, code: i32, output: &str, at: DateTime<Utc>) -> CheckResult {
        let mut result = CheckResult::for_service("web1", "http", at);
        result.return_code = code;
        result.output = output.to_string();
        result.finish_time = at + Duration::milliseconds(250);
        result
    }

    /// Process an active service result. The pending check is dropped
    /// first, as it would have been when the check was launched.
    pub(crate) fn apply_service(&mut self, code: i32, output: &str, at: DateTime<Utc>) {
        self.engine.events.remove(CheckTarget::Service(self.service));
        let result = self.service_result(code, output, at);
        assert!(self.engine.process_result(result, at));
    }

    /// Run an active host check the way the dispatcher would, with the
    /// attempt advanced before the result is applied
    pub(crate) fn check_host(&mut self, id: HostId, code: i32, output: &str, at: DateTime<Utc>) {
        self.engine.events.remove(CheckTarget::Host(id));
        self.engine.adjust_host_check_attempt(id, true);
        let name = self.engine.objects.host(id).name.clone();
        let mut result = CheckResult::for_host(name, at);
        result.return_code = code;
        result.output = output.to_string();
        self.engine.handle_host_result(id, result, at);
    }

    pub(crate) fn service_notifications(&self) -> usize {
        self.hooks
            .calls()
            .iter()
            .filter(|call| matches!(call, HookCall::ServiceNotification { .. }))
            .count()
    }

    pub(crate) fn service_event_handlers(&self) -> usize {
        self.hooks
            .calls()
            .iter()
            .filter(|call| matches!(call, HookCall::ServiceEventHandler { .. }))
            .count()
    }

    pub(crate) fn host_notifications(&self) -> usize {
        self.hooks
            .calls()
            .iter()
            .filter(|call| matches!(call, HookCall::HostNotification { .. }))
            .count()
    }
}
