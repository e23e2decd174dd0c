//! Sweeps for lost and stale checks, plus check statistics
//!
//! The orphan sweep recovers checks whose result never arrived. The
//! freshness sweep forces a check of entities whose last result is older
//! than their threshold, which is what makes passive-only services go
//! stale.

pub mod stats;


pub use stats::{CheckStatKind, CheckStats, CHECK_STATS_BUCKETS};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::engine::{seconds, Engine};
use crate::models::{CheckOptions, CheckType, HostId, ServiceId, StateType};

/// Extra seconds granted past the expected return time before a check is
/// considered orphaned
pub const ORPHAN_SLACK_SECS: i64 = 600;

/// Fraction of the freshness threshold the engine must have been down for
/// before a passive entity is measured from program start instead
const PASSIVE_RESTART_FACTOR: f64 = 0.618;

/// What freshness is computed from, common to hosts and services
struct FreshnessInput {
    explicit_threshold: u64,
    /// Check or retry interval in interval units, depending on state
    interval_units: f64,
    latency: f64,
    has_been_checked: bool,
    last_check: Option<DateTime<Utc>>,
    check_type: CheckType,
    checks_enabled: bool,
    max_spread: u64,
}

impl Engine {
    /// Threshold in seconds and the instant the last result expires
    fn freshness_expiration(&self, input: &FreshnessInput) -> (f64, DateTime<Utc>) {
        let interval_length = self.config.interval_length;
        let threshold = if input.explicit_threshold == 0 {
            input.interval_units * interval_length as f64
                + input.latency
                + self.config.additional_freshness_latency as f64
        } else {
            input.explicit_threshold as f64
        };

        let start = self.program_start;
        let mut expiration = match input.last_check {
            Some(last) if input.has_been_checked => {
                if input.checks_enabled && start > last && input.explicit_threshold == 0 {
                    start
                        + seconds(threshold)
                        + Duration::seconds((input.max_spread * interval_length) as i64)
                } else {
                    last + seconds(threshold)
                }
            }
            _ => start + seconds(threshold),
        };

        // A passive entity measured across a long outage would go stale the
        // moment the engine comes back
        if input.check_type == CheckType::Passive
            && input.last_check.map_or(true, |last| last < start)
        {
            let long_outage = self.last_program_stop.map_or(true, |stop| {
                (start - stop).num_seconds() as f64 > threshold * PASSIVE_RESTART_FACTOR
            });
            if long_outage {
                expiration = start + seconds(threshold);
            }
        }
        (threshold, expiration)
    }

    /// Whether the last result of a service is still within its freshness
    /// threshold
    pub fn is_service_result_fresh(&self, id: ServiceId, now: DateTime<Utc>, log: bool) -> bool {
        let svc = self.objects.service(id);
        let interval_units = if svc.state_type == StateType::Hard || svc.current_state.is_ok() {
            svc.check_interval
        } else {
            svc.retry_interval
        };
        let (threshold, expiration) = self.freshness_expiration(&FreshnessInput {
            explicit_threshold: svc.freshness_threshold,
            interval_units,
            latency: svc.latency,
            has_been_checked: svc.has_been_checked,
            last_check: svc.last_check,
            check_type: svc.check_type,
            checks_enabled: svc.checks_enabled,
            max_spread: self.config.max_service_check_spread,
        });

        if expiration < now {
            if log {
                warn!(
                    "The results of service '{}' are stale by {}s (threshold={:.0}s), forcing an immediate check",
                    svc.display_name(),
                    (now - expiration).num_seconds(),
                    threshold
                );
            }
            return false;
        }
        debug!("Results of service '{}' are fresh", svc.display_name());
        true
    }

    pub fn is_host_result_fresh(&self, id: HostId, now: DateTime<Utc>, log: bool) -> bool {
        let host = self.objects.host(id);
        let interval_units = if host.state_type == StateType::Hard || host.current_state.is_up() {
            host.check_interval
        } else {
            host.retry_interval
        };
        let (threshold, expiration) = self.freshness_expiration(&FreshnessInput {
            explicit_threshold: host.freshness_threshold,
            interval_units,
            latency: host.latency,
            has_been_checked: host.has_been_checked,
            last_check: host.last_check,
            check_type: host.check_type,
            checks_enabled: host.checks_enabled,
            max_spread: self.config.max_host_check_spread,
        });

        if expiration < now {
            if log {
                warn!(
                    "The results of host '{}' are stale by {}s (threshold={:.0}s), forcing an immediate check",
                    host.name,
                    (now - expiration).num_seconds(),
                    threshold
                );
            }
            return false;
        }
        debug!("Results of host '{}' are fresh", host.name);
        true
    }

    /// Force a check of every service whose last result went stale.
    /// Returns how many checks were scheduled.
    pub fn check_service_result_freshness(&mut self, now: DateTime<Utc>) -> usize {
        if !self.config.check_service_freshness {
            debug!("Service freshness checking is disabled");
            return 0;
        }

        let mut forced = 0;
        for id in self.objects.service_ids() {
            let svc = self.objects.service(id);
            if !svc.check_freshness
                || svc.is_executing
                || svc.is_being_freshened
                || (!svc.checks_enabled && !svc.accept_passive_checks)
                || (svc.check_interval == 0.0 && svc.freshness_threshold == 0)
                || !self.periods.is_time_in_period(now, svc.check_period)
            {
                continue;
            }
            if self.is_service_result_fresh(id, now, true) {
                continue;
            }
            self.objects.service_mut(id).is_being_freshened = true;
            self.schedule_service_check(
                id,
                now,
                CheckOptions::FORCE_EXECUTION | CheckOptions::FRESHNESS_CHECK,
            );
            forced += 1;
        }
        forced
    }

    pub fn check_host_result_freshness(&mut self, now: DateTime<Utc>) -> usize {
        if !self.config.check_host_freshness {
            debug!("Host freshness checking is disabled");
            return 0;
        }

        let mut forced = 0;
        for id in self.objects.host_ids() {
            let host = self.objects.host(id);
            if !host.check_freshness
                || host.is_executing
                || host.is_being_freshened
                || (!host.checks_enabled && !host.accept_passive_checks)
                || !self.periods.is_time_in_period(now, host.check_period)
            {
                continue;
            }
            if self.is_host_result_fresh(id, now, true) {
                continue;
            }
            self.objects.host_mut(id).is_being_freshened = true;
            self.schedule_host_check(
                id,
                now,
                CheckOptions::FORCE_EXECUTION | CheckOptions::FRESHNESS_CHECK,
            );
            forced += 1;
        }
        forced
    }

    fn orphan_deadline(
        &self,
        next_check: DateTime<Utc>,
        latency: f64,
        timeout: u64,
    ) -> DateTime<Utc> {
        next_check
            + seconds(latency)
            + Duration::seconds(timeout as i64)
            + Duration::seconds(self.config.check_result_reaper_frequency as i64)
            + Duration::seconds(ORPHAN_SLACK_SECS)
    }

    /// Recover service checks whose result never came back. Returns how
    /// many were rescheduled.
    pub fn check_for_orphaned_services(&mut self, now: DateTime<Utc>) -> usize {
        if !self.config.check_for_orphaned_services {
            return 0;
        }

        let mut orphans = 0;
        for id in self.objects.service_ids() {
            let svc = self.objects.service(id);
            if !svc.is_executing {
                continue;
            }
            let Some(next_check) = svc.next_check else {
                continue;
            };
            let deadline = self.orphan_deadline(next_check, svc.latency, self.config.service_check_timeout);
            if deadline >= now {
                continue;
            }

            warn!(
                "The check of service '{}' looks like it was orphaned (results never came back), rescheduling it",
                svc.display_name()
            );
            self.running_service_checks = self.running_service_checks.saturating_sub(1);
            self.objects.service_mut(id).is_executing = false;
            self.schedule_service_check(id, now, CheckOptions::ORPHAN_CHECK);
            orphans += 1;
        }
        orphans
    }

    pub fn check_for_orphaned_hosts(&mut self, now: DateTime<Utc>) -> usize {
        if !self.config.check_for_orphaned_hosts {
            return 0;
        }

        let mut orphans = 0;
        for id in self.objects.host_ids() {
            let host = self.objects.host(id);
            if !host.is_executing {
                continue;
            }
            let Some(next_check) = host.next_check else {
                continue;
            };
            let deadline = self.orphan_deadline(next_check, host.latency, self.config.host_check_timeout);
            if deadline >= now {
                continue;
            }

            warn!(
                "The check of host '{}' looks like it was orphaned (results never came back), rescheduling it",
                host.name
            );
            self.running_host_checks = self.running_host_checks.saturating_sub(1);
            self.objects.host_mut(id).is_executing = false;
            self.schedule_host_check(id, now, CheckOptions::ORPHAN_CHECK);
            orphans += 1;
        }
        orphans
    }
}
