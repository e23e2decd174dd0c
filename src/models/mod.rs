//! Data model for monitored entities and check results

pub mod check_result;
pub mod history;
pub mod host;
pub mod ids;
pub mod options;
pub mod service;
pub mod state;

pub use check_result::CheckResult;
pub use history::StateHistory;
pub use host::Host;
pub use ids::{CheckTarget, DependencyId, HostId, ServiceId, TimePeriodId};
pub use options::CheckOptions;
pub use service::Service;
pub use state::{AcknowledgementType, CheckType, HostState, ServiceState, StateType};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Notification bookkeeping shared by hosts and services
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationState {
    pub last_notification: Option<DateTime<Utc>>,
    pub next_notification: Option<DateTime<Utc>>,
    pub current_number: u32,
    pub no_more_notifications: bool,
}

impl NotificationState {
    /// Reset timers after a state change; the counter survives so hard
    /// problem-to-problem changes keep escalating.
    pub fn reset_times(&mut self) {
        self.last_notification = None;
        self.next_notification = None;
        self.no_more_notifications = false;
    }

    /// Full reset once the entity has recovered
    pub fn reset(&mut self) {
        self.reset_times();
        self.current_number = 0;
    }
}

/// Event and problem identifiers
///
/// A new event id is issued on every state change. A problem id lives for
/// the duration of one outage: issued when leaving OK/UP, cleared (and kept
/// in `last_problem_id`) when returning to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventIds {
    pub current_event_id: u64,
    pub last_event_id: u64,
    pub current_problem_id: u64,
    pub last_problem_id: u64,
}

/// Flap detection state carried by each entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlapState {
    #[serde(skip)]
    pub history: StateHistory,
    pub percent_state_change: f64,
    pub is_flapping: bool,
}
