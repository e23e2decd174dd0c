//! Flap detection
//!
//! Each entity keeps its last 21 recorded states. Every change between
//! consecutive samples adds a weight that grows linearly from 0.75 for the
//! oldest pair to 1.25 for the newest, so recent changes count more. The
//! weighted sum over the 20 pairs, as a percentage, is compared against a
//! low and a high threshold; between the two the flapping flag is left as
//! it was.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::engine::{Engine, NotificationKind};
use crate::models::{HostId, ServiceId, StateHistory, StateType};
use crate::models::history::MAX_STATE_HISTORY_ENTRIES;

const LOW_CURVE_VALUE: f64 = 0.75;
const HIGH_CURVE_VALUE: f64 = 1.25;

/// Weighted percentage of state changes across the history
pub fn percent_state_change(history: &StateHistory) -> f64 {
    let pairs = (MAX_STATE_HISTORY_ENTRIES - 1) as f64;
    let mut samples = history.oldest_first();
    let Some(mut previous) = samples.next() else {
        return 0.0;
    };

    let mut changes = 0.0;
    for (x, sample) in samples.enumerate() {
        if sample != previous {
            changes +=
                x as f64 * (HIGH_CURVE_VALUE - LOW_CURVE_VALUE) / (pairs - 1.0) + LOW_CURVE_VALUE;
        }
        previous = sample;
    }
    changes * 100.0 / pairs
}

/// New flapping flag for `percent`, or `None` while it sits strictly
/// between the thresholds
pub fn flap_decision(percent: f64, low: f64, high: f64) -> Option<bool> {
    if percent <= low {
        Some(false)
    } else if percent >= high {
        Some(true)
    } else {
        None
    }
}

fn threshold(own: f64, global: f64) -> f64 {
    if own <= 0.0 {
        global
    } else {
        own
    }
}

impl Engine {
    /// Re-evaluate service flapping, recording the current state first
    /// when `record` is set. Soft problem states are never recorded.
    pub(crate) fn check_for_service_flapping(&mut self, id: ServiceId, record: bool, now: DateTime<Utc>) {
        let enabled = self.config.enable_flap_detection;
        let svc = self.objects.service_mut(id);
        if svc.state_type == StateType::Soft && !svc.current_state.is_ok() {
            return;
        }
        let low = threshold(svc.low_flap_threshold, self.config.low_service_flap_threshold);
        let high = threshold(svc.high_flap_threshold, self.config.high_service_flap_threshold);

        if record && svc.flap_detection_enabled {
            svc.flapping.history.record(svc.current_state.code());
        }
        let percent = percent_state_change(&svc.flapping.history);
        svc.flapping.percent_state_change = percent;

        if !enabled || !svc.flap_detection_enabled {
            return;
        }
        let Some(is_flapping) = flap_decision(percent, low, high) else {
            return;
        };
        if is_flapping == svc.flapping.is_flapping {
            return;
        }
        svc.flapping.is_flapping = is_flapping;

        let kind = if is_flapping {
            warn!(
                "SERVICE FLAPPING ALERT: {};STARTED; Service appears to have started flapping ({:.1}% change >= {:.1}% threshold)",
                svc.display_name(),
                percent,
                high
            );
            NotificationKind::FlappingStart
        } else {
            warn!(
                "SERVICE FLAPPING ALERT: {};STOPPED; Service appears to have stopped flapping ({:.1}% change < {:.1}% threshold)",
                svc.display_name(),
                percent,
                low
            );
            NotificationKind::FlappingStop
        };
        self.notify_service(id, kind, now);
    }

    pub(crate) fn check_for_host_flapping(&mut self, id: HostId, record: bool, now: DateTime<Utc>) {
        let enabled = self.config.enable_flap_detection;
        let host = self.objects.host_mut(id);
        let low = threshold(host.low_flap_threshold, self.config.low_host_flap_threshold);
        let high = threshold(host.high_flap_threshold, self.config.high_host_flap_threshold);

        if record && host.flap_detection_enabled {
            host.flapping.history.record(host.current_state.code());
        }
        let percent = percent_state_change(&host.flapping.history);
        host.flapping.percent_state_change = percent;

        if !enabled || !host.flap_detection_enabled {
            return;
        }
        let Some(is_flapping) = flap_decision(percent, low, high) else {
            return;
        };
        if is_flapping == host.flapping.is_flapping {
            return;
        }
        host.flapping.is_flapping = is_flapping;

        let kind = if is_flapping {
            warn!(
                "HOST FLAPPING ALERT: {};STARTED; Host appears to have started flapping ({:.1}% change >= {:.1}% threshold)",
                host.name, percent, high
            );
            NotificationKind::FlappingStart
        } else {
            warn!(
                "HOST FLAPPING ALERT: {};STOPPED; Host appears to have stopped flapping ({:.1}% change < {:.1}% threshold)",
                host.name, percent, low
            );
            NotificationKind::FlappingStop
        };
        self.notify_host(id, kind, now);
    }
}
