//! Monitored host

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AcknowledgementType, CheckOptions, CheckType, DependencyId, EventIds, FlapState, HostId,
    HostState, NotificationState, ServiceId, StateType, TimePeriodId,
};

#[derive(Debug, Clone, Serialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub alias: String,
    pub address: String,

    // Check configuration
    /// Command line template; `None` means the host is assumed UP
    pub check_command: Option<String>,
    /// Interval between regular checks, in `interval_length` units
    pub check_interval: f64,
    /// Interval between retries while in a soft problem state
    pub retry_interval: f64,
    pub max_attempts: u32,
    pub check_period: Option<TimePeriodId>,
    pub checks_enabled: bool,
    pub accept_passive_checks: bool,
    pub check_freshness: bool,
    /// Explicit staleness threshold in seconds (0 derives it from the interval)
    pub freshness_threshold: u64,
    pub flap_detection_enabled: bool,
    /// Per-host flap thresholds; non-positive values fall back to the global ones
    pub low_flap_threshold: f64,
    pub high_flap_threshold: f64,
    pub obsess: bool,
    pub event_handler_enabled: bool,
    pub notifications_enabled: bool,
    /// States whose unchanged-but-different output is logged
    pub stalk_on: Vec<HostState>,

    // Relations
    pub parents: Vec<HostId>,
    pub children: Vec<HostId>,
    pub services: Vec<ServiceId>,
    pub exec_dependencies: Vec<DependencyId>,
    pub notify_dependencies: Vec<DependencyId>,

    // Runtime state
    pub current_state: HostState,
    pub last_state: HostState,
    pub last_hard_state: HostState,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,
    pub is_executing: bool,
    pub is_being_freshened: bool,
    pub should_be_scheduled: bool,
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
    pub last_time_up: Option<DateTime<Utc>>,
    pub last_time_down: Option<DateTime<Utc>>,
    pub last_time_unreachable: Option<DateTime<Utc>>,
    pub notifications: NotificationState,
    pub acknowledgement: AcknowledgementType,
    pub scheduled_downtime_depth: u32,
    pub ids: EventIds,
    pub flapping: FlapState,
}

impl Host {
    pub fn new(id: HostId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            alias: name.clone(),
            address: name.clone(),
            name,
            check_command: None,
            check_interval: 5.0,
            retry_interval: 1.0,
            max_attempts: 3,
            check_period: None,
            checks_enabled: true,
            accept_passive_checks: true,
            check_freshness: false,
            freshness_threshold: 0,
            flap_detection_enabled: true,
            low_flap_threshold: 0.0,
            high_flap_threshold: 0.0,
            obsess: true,
            event_handler_enabled: true,
            notifications_enabled: true,
            stalk_on: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            services: Vec::new(),
            exec_dependencies: Vec::new(),
            notify_dependencies: Vec::new(),
            current_state: HostState::Up,
            last_state: HostState::Up,
            last_hard_state: HostState::Up,
            state_type: StateType::Hard,
            current_attempt: 1,
            has_been_checked: false,
            is_executing: false,
            is_being_freshened: false,
            should_be_scheduled: true,
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
            last_time_up: None,
            last_time_down: None,
            last_time_unreachable: None,
            notifications: NotificationState::default(),
            acknowledgement: AcknowledgementType::None,
            scheduled_downtime_depth: 0,
            ids: EventIds::default(),
            flapping: FlapState::default(),
        }
    }

    /// Interval in seconds that applies to the next check given the
    /// current state (retry interval while soft and down).
    pub fn active_interval_secs(&self, interval_length: u64) -> f64 {
        let units = if self.state_type == StateType::Soft && !self.current_state.is_up() {
            self.retry_interval
        } else {
            self.check_interval
        };
        units * interval_length as f64
    }

    pub fn is_problem(&self) -> bool {
        !self.current_state.is_up()
    }
}
