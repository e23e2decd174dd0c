//! Insert/replace policy for check requests

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::ScheduledCheck;
use crate::engine::Engine;
use crate::models::{CheckOptions, CheckTarget, HostId, ServiceId};

/// Whether a new request (`due`, `options`) displaces the pending `existing`
/// check. A forced request beats an unforced one; between equals only a
/// strictly earlier request wins.
pub fn should_replace(existing: &ScheduledCheck, due: DateTime<Utc>, options: CheckOptions) -> bool {
    match (existing.options.is_forced(), options.is_forced()) {
        (false, true) => true,
        (true, false) => false,
        _ => due < existing.due,
    }
}

/// A pure dependency refresh is redundant when the last result is recent enough
fn satisfied_by_cache(
    options: CheckOptions,
    last_check: Option<DateTime<Utc>>,
    horizon: u64,
    check_time: DateTime<Utc>,
) -> bool {
    options == CheckOptions::DEPENDENCY_CHECK
        && last_check.is_some_and(|last| last + Duration::seconds(horizon as i64) > check_time)
}

impl Engine {
    /// Request an active check of a service at `check_time`
    pub fn schedule_service_check(
        &mut self,
        id: ServiceId,
        check_time: DateTime<Utc>,
        options: CheckOptions,
    ) {
        let svc = self.objects.service(id);
        if !svc.checks_enabled && !options.is_forced() {
            debug!(
                "Active checks of service '{}' are disabled, not scheduling",
                svc.display_name()
            );
            return;
        }
        if satisfied_by_cache(
            options,
            svc.last_check,
            self.config.cached_service_check_horizon,
            check_time,
        ) {
            debug!(
                "Last result of service '{}' is recent enough, skipping dependency check",
                svc.display_name()
            );
            return;
        }

        let target = CheckTarget::Service(id);
        let (due, options) = self.place_check(target, check_time, options);
        let svc = self.objects.service_mut(id);
        svc.next_check = Some(due);
        svc.check_options = options;
    }

    /// Request an active check of a host at `check_time`
    pub fn schedule_host_check(&mut self, id: HostId, check_time: DateTime<Utc>, options: CheckOptions) {
        let host = self.objects.host(id);
        if !host.checks_enabled && !options.is_forced() {
            debug!(
                "Active checks of host '{}' are disabled, not scheduling",
                host.name
            );
            return;
        }
        if satisfied_by_cache(
            options,
            host.last_check,
            self.config.cached_host_check_horizon,
            check_time,
        ) {
            debug!(
                "Last result of host '{}' is recent enough, skipping dependency check",
                host.name
            );
            return;
        }

        let target = CheckTarget::Host(id);
        let (due, options) = self.place_check(target, check_time, options);
        let host = self.objects.host_mut(id);
        host.next_check = Some(due);
        host.check_options = options;
    }

    /// Apply the tie-break against any pending check and return the check
    /// that ends up queued
    fn place_check(
        &mut self,
        target: CheckTarget,
        check_time: DateTime<Utc>,
        options: CheckOptions,
    ) -> (DateTime<Utc>, CheckOptions) {
        if let Some(existing) = self.events.get(target).copied() {
            if !should_replace(&existing, check_time, options) {
                debug!(
                    "Keeping pending check of {:?} at {} (ignoring request for {})",
                    target, existing.due, check_time
                );
                return (existing.due, existing.options);
            }
            debug!(
                "Replacing pending check of {:?} at {} with {}",
                target, existing.due, check_time
            );
        }
        self.events.insert(target, check_time, options);
        (check_time, options)
    }

    /// Queue the first check of every schedulable entity, spread evenly
    /// over each entity's check window so they do not all start at once.
    pub fn schedule_initial_checks(&mut self, now: DateTime<Utc>) {
        let interval_length = self.config.interval_length as f64;

        let services: Vec<ServiceId> = self
            .objects
            .service_ids()
            .filter(|&id| {
                let svc = self.objects.service(id);
                svc.checks_enabled && svc.check_interval > 0.0 && svc.check_command.is_some()
            })
            .collect();
        let spread = self.config.max_service_check_spread as f64;
        let total = services.len().max(1) as f64;
        for id in self.objects.service_ids() {
            self.objects.service_mut(id).should_be_scheduled = false;
        }
        for (index, &id) in services.iter().enumerate() {
            let svc = self.objects.service(id);
            let window = svc.check_interval.min(spread) * interval_length;
            let offset = Duration::milliseconds((window * 1000.0 * index as f64 / total) as i64);
            let due = self
                .periods
                .next_valid_time(now + offset, svc.check_period, now);
            self.objects.service_mut(id).should_be_scheduled = true;
            self.schedule_service_check(id, due, CheckOptions::NONE);
        }

        let hosts: Vec<HostId> = self
            .objects
            .host_ids()
            .filter(|&id| {
                let host = self.objects.host(id);
                host.checks_enabled && host.check_interval > 0.0
            })
            .collect();
        let spread = self.config.max_host_check_spread as f64;
        let total = hosts.len().max(1) as f64;
        for id in self.objects.host_ids() {
            self.objects.host_mut(id).should_be_scheduled = false;
        }
        for (index, &id) in hosts.iter().enumerate() {
            let host = self.objects.host(id);
            let window = host.check_interval.min(spread) * interval_length;
            let offset = Duration::milliseconds((window * 1000.0 * index as f64 / total) as i64);
            let due = self
                .periods
                .next_valid_time(now + offset, host.check_period, now);
            self.objects.host_mut(id).should_be_scheduled = true;
            self.schedule_host_check(id, due, CheckOptions::NONE);
        }

        debug!(
            "Scheduled initial checks for {} services and {} hosts",
            services.len(),
            hosts.len()
        );
    }
}
