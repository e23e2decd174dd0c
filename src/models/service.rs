//! Monitored service

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AcknowledgementType, CheckOptions, CheckType, DependencyId, EventIds, FlapState, HostId,
    NotificationState, ServiceId, ServiceState, StateType, TimePeriodId,
};

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: ServiceId,
    pub host: HostId,
    /// Denormalised for logging and result routing
    pub host_name: String,
    pub description: String,

    // Check configuration
    pub check_command: Option<String>,
    pub check_interval: f64,
    pub retry_interval: f64,
    pub max_attempts: u32,
    pub check_period: Option<TimePeriodId>,
    pub checks_enabled: bool,
    pub accept_passive_checks: bool,
    pub check_freshness: bool,
    pub freshness_threshold: u64,
    /// Volatile services notify and run handlers on every hard problem result
    pub is_volatile: bool,
    pub flap_detection_enabled: bool,
    pub low_flap_threshold: f64,
    pub high_flap_threshold: f64,
    pub obsess: bool,
    pub event_handler_enabled: bool,
    pub notifications_enabled: bool,
    pub stalk_on: Vec<ServiceState>,

    // Relations
    /// Services whose hard CRITICAL/UNKNOWN state blocks this one
    pub parents: Vec<ServiceId>,
    pub exec_dependencies: Vec<DependencyId>,
    pub notify_dependencies: Vec<DependencyId>,

    // Runtime state
    pub current_state: ServiceState,
    pub last_state: ServiceState,
    pub last_hard_state: ServiceState,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,
    pub is_executing: bool,
    pub is_being_freshened: bool,
    pub should_be_scheduled: bool,
    /// The owning host was down or unreachable when this service was last evaluated
    pub host_problem_at_last_check: bool,
    pub check_type: CheckType,
    pub check_options: CheckOptions,
    pub last_check: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    pub plugin_output: String,
    pub long_output: Option<String>,
    pub perf_data: Option<String>,
    pub latency: f64,
    pub execution_time: f64,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    pub last_time_ok: Option<DateTime<Utc>>,
    pub last_time_warning: Option<DateTime<Utc>>,
    pub last_time_critical: Option<DateTime<Utc>>,
    pub last_time_unknown: Option<DateTime<Utc>>,
    pub notifications: NotificationState,
    pub acknowledgement: AcknowledgementType,
    pub scheduled_downtime_depth: u32,
    pub ids: EventIds,
    pub flapping: FlapState,
}

impl Service {
    pub fn new(
        id: ServiceId,
        host: HostId,
        host_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            host,
            host_name: host_name.into(),
            description: description.into(),
            check_command: None,
            check_interval: 5.0,
            retry_interval: 1.0,
            max_attempts: 3,
            check_period: None,
            checks_enabled: true,
            accept_passive_checks: true,
            check_freshness: false,
            freshness_threshold: 0,
            is_volatile: false,
            flap_detection_enabled: true,
            low_flap_threshold: 0.0,
            high_flap_threshold: 0.0,
            obsess: true,
            event_handler_enabled: true,
            notifications_enabled: true,
            stalk_on: Vec::new(),
            parents: Vec::new(),
            exec_dependencies: Vec::new(),
            notify_dependencies: Vec::new(),
            current_state: ServiceState::Ok,
            last_state: ServiceState::Ok,
            last_hard_state: ServiceState::Ok,
            state_type: StateType::Hard,
            current_attempt: 1,
            has_been_checked: false,
            is_executing: false,
            is_being_freshened: false,
            should_be_scheduled: true,
            host_problem_at_last_check: false,
            check_type: CheckType::Active,
            check_options: CheckOptions::NONE,
            last_check: None,
            next_check: None,
            plugin_output: String::new(),
            long_output: None,
            perf_data: None,
            latency: 0.0,
            execution_time: 0.0,
            last_state_change: None,
            last_hard_state_change: None,
            last_time_ok: None,
            last_time_warning: None,
            last_time_critical: None,
            last_time_unknown: None,
            notifications: NotificationState::default(),
            acknowledgement: AcknowledgementType::None,
            scheduled_downtime_depth: 0,
            ids: EventIds::default(),
            flapping: FlapState::default(),
        }
    }

    /// Interval in seconds that applies to the next check given the
    /// current state (retry interval while soft and not OK).
    pub fn active_interval_secs(&self, interval_length: u64) -> f64 {
        let units = if self.state_type == StateType::Soft && !self.current_state.is_ok() {
            self.retry_interval
        } else {
            self.check_interval
        };
        units * interval_length as f64
    }

    /// `host/description`, used in log lines
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.host_name, self.description)
    }
}
