//! Collaborator callbacks invoked by the engine
//!
//! Notification delivery, event handlers, status publishing and the broker
//! live outside the core. The engine calls them at fixed points of the
//! check pipeline through [`EngineHooks`]; every method has a no-op default.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::dependency::DependencyResult;
use crate::models::{CheckResult, Host, HostState, Service, ServiceState};

/// Why a notification is being raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Problem or recovery, depending on the entity's current state
    Normal,
    FlappingStart,
    FlappingStop,
}

/// Verdict of a broker callback
#[derive(Debug, Clone, PartialEq)]
pub enum HookDecision {
    Proceed,
    /// Drop the check (rescheduled later) or the result (discarded)
    Cancel,
    /// The callback takes over. A substitute result, when given, is
    /// processed in place of the real one.
    Override { substitute: Option<CheckResult> },
}

/// Points at which the broker is consulted
#[derive(Debug, Clone, Copy)]
pub enum BrokerEvent<'a> {
    /// Before viability is settled for an active service check
    ServiceCheckPrecheck(&'a Service),
    /// Command line is ready, process not yet started
    ServiceCheckInitiate {
        service: &'a Service,
        command_line: &'a str,
    },
    HostCheckPrecheck(&'a Host),
    HostCheckInitiate {
        host: &'a Host,
        command_line: &'a str,
    },
    /// A result is about to be applied
    ServiceResult {
        service: &'a Service,
        result: &'a CheckResult,
    },
    HostResult {
        host: &'a Host,
        result: &'a CheckResult,
    },
    /// A result has been applied; the decision is ignored
    ServiceCheckProcessed(&'a Service),
    HostCheckProcessed(&'a Host),
}

pub trait EngineHooks: Send {
    /// `dependencies` is the notification dependency verdict for the service
    fn service_notification(
        &mut self,
        _service: &Service,
        _kind: NotificationKind,
        _dependencies: DependencyResult,
    ) {
    }

    fn host_notification(
        &mut self,
        _host: &Host,
        _kind: NotificationKind,
        _dependencies: DependencyResult,
    ) {
    }

    fn service_event_handler(&mut self, _service: &Service) {}

    fn host_event_handler(&mut self, _host: &Host) {}

    fn service_status_updated(&mut self, _service: &Service) {}

    fn host_status_updated(&mut self, _host: &Host) {}

    fn obsess_over_service(&mut self, _service: &Service) {}

    fn obsess_over_host(&mut self, _host: &Host) {}

    fn service_perfdata(&mut self, _service: &Service) {}

    fn host_perfdata(&mut self, _host: &Host) {}

    fn broker(&mut self, _event: BrokerEvent<'_>) -> HookDecision {
        HookDecision::Proceed
    }
}

/// Hooks that only report through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl EngineHooks for LoggingHooks {
    fn service_notification(
        &mut self,
        service: &Service,
        kind: NotificationKind,
        dependencies: DependencyResult,
    ) {
        if !dependencies.is_ok() {
            debug!(
                "Notification for service '{}' suppressed by a failed dependency",
                service.display_name()
            );
            return;
        }
        info!(
            "SERVICE NOTIFICATION: {};{};{:?};{}",
            service.display_name(),
            service.current_state,
            kind,
            service.plugin_output
        );
    }

    fn host_notification(&mut self, host: &Host, kind: NotificationKind, dependencies: DependencyResult) {
        if !dependencies.is_ok() {
            debug!(
                "Notification for host '{}' suppressed by a failed dependency",
                host.name
            );
            return;
        }
        info!(
            "HOST NOTIFICATION: {};{};{:?};{}",
            host.name, host.current_state, kind, host.plugin_output
        );
    }

    fn service_event_handler(&mut self, service: &Service) {
        debug!(
            "Event handler for service '{}' ({} {})",
            service.display_name(),
            service.current_state,
            service.state_type
        );
    }

    fn host_event_handler(&mut self, host: &Host) {
        debug!(
            "Event handler for host '{}' ({} {})",
            host.name, host.current_state, host.state_type
        );
    }
}

/// One recorded callback
#[derive(Debug, Clone, PartialEq)]
pub enum HookCall {
    ServiceNotification {
        service: String,
        state: ServiceState,
        kind: NotificationKind,
        dependencies: DependencyResult,
    },
    HostNotification {
        host: String,
        state: HostState,
        kind: NotificationKind,
        dependencies: DependencyResult,
    },
    ServiceEventHandler {
        service: String,
        state: ServiceState,
    },
    HostEventHandler {
        host: String,
        state: HostState,
    },
    ObsessOverService(String),
    ObsessOverHost(String),
}

/// Hooks that keep a shared log of every notification, event handler and
/// obsess call, for embedding code that wants to inspect what happened.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    calls: Arc<Mutex<Vec<HookCall>>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calls recorded so far
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Remove and return the recorded calls
    pub fn take(&self) -> Vec<HookCall> {
        self.calls
            .lock()
            .map(|mut calls| std::mem::take(&mut *calls))
            .unwrap_or_default()
    }

    fn record(&self, call: HookCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl EngineHooks for RecordingHooks {
    fn service_notification(
        &mut self,
        service: &Service,
        kind: NotificationKind,
        dependencies: DependencyResult,
    ) {
        self.record(HookCall::ServiceNotification {
            service: service.display_name(),
            state: service.current_state,
            kind,
            dependencies,
        });
    }

    fn host_notification(&mut self, host: &Host, kind: NotificationKind, dependencies: DependencyResult) {
        self.record(HookCall::HostNotification {
            host: host.name.clone(),
            state: host.current_state,
            kind,
            dependencies,
        });
    }

    fn service_event_handler(&mut self, service: &Service) {
        self.record(HookCall::ServiceEventHandler {
            service: service.display_name(),
            state: service.current_state,
        });
    }

    fn host_event_handler(&mut self, host: &Host) {
        self.record(HookCall::HostEventHandler {
            host: host.name.clone(),
            state: host.current_state,
        });
    }

    fn obsess_over_service(&mut self, service: &Service) {
        self.record(HookCall::ObsessOverService(service.display_name()));
    }

    fn obsess_over_host(&mut self, host: &Host) {
        self.record(HookCall::ObsessOverHost(host.name.clone()));
    }
}
