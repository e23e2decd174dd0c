//! Service result handling
//!
//! A non-OK result only counts as a retry while the owning host is UP.
//! When the host is down or unreachable the service goes straight to a
//! hard state without notifying, since the outage belongs to the host.
//! `current_attempt` numbers the check being processed: the first problem
//! result leaves the service SOFT at attempt 2, and the result that finds
//! `current_attempt == max_attempts` makes the problem hard.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::output::{parse_check_output, sanitize_short_output};
use super::return_code::{abnormal_exit_output, out_of_bounds_output, timed_out_output, CheckExit};
use crate::dependency::DependencyKind;
use crate::engine::{BrokerEvent, Engine, NotificationKind};
use crate::models::{
    AcknowledgementType, CheckOptions, CheckResult, CheckType, HostState, ServiceId, ServiceState,
    StateType,
};
use crate::monitor::CheckStatKind;

/// A host never checked is verified first unless its own check is this close
const FIRST_HOST_CHECK_WINDOW_SECS: i64 = 300;

const NO_OUTPUT: &str = "(No output returned from plugin)";

impl Engine {
    /// Apply one service check result
    pub fn handle_service_result(&mut self, id: ServiceId, result: CheckResult, now: DateTime<Utc>) {
        let active = result.check_type == CheckType::Active;
        let freshness_check = result.check_options.contains(CheckOptions::FRESHNESS_CHECK);

        if active {
            self.running_service_checks = self.running_service_checks.saturating_sub(1);
        } else {
            let svc = self.objects.service(id);
            if !self.config.accept_passive_service_checks || !svc.accept_passive_checks {
                debug!(
                    "Discarding passive result for service '{}': passive checks are disabled",
                    svc.display_name()
                );
                return;
            }
        }

        let svc = self.objects.service_mut(id);
        if freshness_check {
            svc.is_being_freshened = false;
        }
        if active {
            svc.is_executing = false;
        }

        // A passive result may have landed while the forced check ran
        if freshness_check && self.is_service_result_fresh(id, now, false) {
            debug!(
                "Discarding freshness check result of service '{}': it is fresh again",
                self.objects.service(id).display_name()
            );
            return;
        }

        let check_time = result.start_time;
        let mut reschedule = result.reschedule_check;
        let host_id = {
            let svc = self.objects.service_mut(id);
            svc.latency = result.latency;
            svc.execution_time = result.execution_time();
            svc.last_check = Some(check_time);
            svc.check_type = result.check_type;
            svc.host
        };
        if !active {
            self.stats.update(CheckStatKind::PassiveServiceCheck, check_time, now);
        }

        let old_output = self.apply_service_output(id, &result);

        let svc = self.objects.service_mut(id);
        match svc.last_state {
            ServiceState::Ok => svc.last_time_ok = Some(check_time),
            ServiceState::Warning => svc.last_time_warning = Some(check_time),
            ServiceState::Critical => svc.last_time_critical = Some(check_time),
            ServiceState::Unknown => svc.last_time_unknown = Some(check_time),
        }
        if !active && self.config.log_passive_checks {
            let svc = self.objects.service(id);
            info!(
                "PASSIVE SERVICE CHECK: {};{};{}",
                svc.display_name(),
                svc.current_state.code(),
                svc.plugin_output
            );
        }

        let current_state = self.objects.service(id).current_state;

        let mut first_host_check_initiated = false;
        if current_state.is_ok() {
            let host = self.objects.host(host_id);
            let checked_soon = host
                .next_check
                .is_some_and(|next| next - now <= Duration::seconds(FIRST_HOST_CHECK_WINDOW_SECS));
            if !host.has_been_checked && !checked_soon {
                first_host_check_initiated = true;
                self.schedule_host_check(host_id, now, CheckOptions::DEPENDENCY_CHECK);
            }
        }

        let svc = self.objects.service_mut(id);
        let state_change = svc.current_state != svc.last_state;
        // A recovery after a host outage is hard even though the attempts
        // were never used up
        let mut hard_change = (svc.host_problem_at_last_check && svc.current_state.is_ok())
            || (svc.current_attempt >= svc.max_attempts && svc.current_state != svc.last_hard_state);

        if state_change || hard_change {
            reschedule = true;
            svc.notifications.reset_times();
            match svc.acknowledgement {
                AcknowledgementType::Normal if state_change || !hard_change => {
                    svc.acknowledgement = AcknowledgementType::None;
                }
                AcknowledgementType::Sticky if svc.current_state.is_ok() => {
                    svc.acknowledgement = AcknowledgementType::None;
                }
                _ => {}
            }
        }

        if svc.last_state_change.is_none() {
            svc.last_state_change = Some(check_time);
        }
        if svc.last_hard_state_change.is_none() {
            svc.last_hard_state_change = Some(check_time);
        }
        if state_change {
            svc.last_state_change = Some(check_time);
        }
        if hard_change {
            svc.last_hard_state_change = Some(check_time);
        }
        let host = self.objects.host_mut(host_id);
        if host.last_state_change.is_none() {
            host.last_state_change = Some(check_time);
        }
        if host.last_hard_state_change.is_none() {
            host.last_hard_state_change = Some(check_time);
        }

        if state_change {
            let event_id = self.next_event_id();
            let problem_id = if self.objects.service(id).last_state.is_ok() {
                Some(self.next_problem_id())
            } else {
                None
            };
            let svc = self.objects.service_mut(id);
            svc.ids.last_event_id = svc.ids.current_event_id;
            svc.ids.current_event_id = event_id;
            if let Some(problem_id) = problem_id {
                svc.ids.current_problem_id = problem_id;
            }
            if svc.current_state.is_ok() {
                svc.ids.last_problem_id = svc.ids.current_problem_id;
                svc.ids.current_problem_id = 0;
            }
        }

        let mut state_was_logged = false;
        let mut flapping_checked = false;
        let mut next_check = check_time + self.interval(self.objects.service(id).check_interval);

        if current_state.is_ok() {
            self.objects.service_mut(id).acknowledgement = AcknowledgementType::None;

            let host = self.objects.host(host_id);
            if !host.current_state.is_up() && !first_host_check_initiated {
                let horizon = Duration::seconds(self.config.cached_host_check_horizon as i64);
                let cache_usable = (!state_change || self.config.cached_state_on_state_change)
                    && host.has_been_checked
                    && host.last_check.is_some_and(|last| now - last <= horizon);
                if cache_usable {
                    self.stats.update(CheckStatKind::ActiveOndemandHostCheck, now, now);
                    self.stats.update(CheckStatKind::ActiveCachedHostCheck, now, now);
                } else {
                    self.schedule_host_check(host_id, now, CheckOptions::DEPENDENCY_CHECK);
                }
            }

            if hard_change {
                self.objects.service_mut(id).state_type = StateType::Hard;
                self.log_service_event(id);
                state_was_logged = true;
                self.check_for_service_flapping(id, true, now);
                self.check_for_host_flapping(host_id, false, now);
                flapping_checked = true;
                self.notify_service(id, NotificationKind::Normal, now);
                self.run_service_event_handler(id);
            } else if state_change {
                self.objects.service_mut(id).state_type = StateType::Soft;
                self.log_service_event(id);
                state_was_logged = true;
                self.run_service_event_handler(id);
            }

            self.obsess_over_service(id);

            let svc = self.objects.service_mut(id);
            svc.host_problem_at_last_check = false;
            svc.current_attempt = 1;
            svc.state_type = StateType::Hard;
            svc.last_hard_state = ServiceState::Ok;
            svc.notifications.reset();
            svc.acknowledgement = AcknowledgementType::None;
        } else {
            let route = self.resolve_service_route(id, state_change, now);

            let host_is_hard = self.objects.host(host_id).state_type == StateType::Hard;
            let svc = self.objects.service_mut(id);
            if !route.is_up() {
                if host_is_hard {
                    if svc.last_hard_state != svc.current_state {
                        hard_change = true;
                    }
                    if state_change || hard_change {
                        svc.last_state_change = Some(check_time);
                    }
                    if hard_change {
                        svc.last_hard_state_change = Some(check_time);
                        svc.state_type = StateType::Hard;
                        svc.last_hard_state = svc.current_state;
                    }
                    svc.host_problem_at_last_check = true;
                } else if svc.last_state.is_ok() {
                    svc.state_type = StateType::Soft;
                }
            } else if svc.host_problem_at_last_check {
                // Give the service its full set of retries now the host is back
                svc.host_problem_at_last_check = false;
                if svc.state_type == StateType::Soft {
                    svc.current_attempt = 1;
                }
            }

            let svc = self.objects.service(id);
            if svc.current_attempt < svc.max_attempts {
                if !route.is_up() {
                    if hard_change {
                        self.log_service_event(id);
                        state_was_logged = true;
                        self.run_service_event_handler(id);
                    }
                } else {
                    let svc = self.objects.service_mut(id);
                    svc.state_type = StateType::Soft;
                    svc.current_attempt += 1;
                    let retry_interval = svc.retry_interval;
                    self.log_service_event(id);
                    state_was_logged = true;
                    self.run_service_event_handler(id);
                    next_check = check_time + self.interval(retry_interval);
                }

                let svc = self.objects.service(id);
                if self.config.execute_service_checks
                    && self.config.enable_predictive_service_dependency_checks
                    && svc.current_attempt == svc.max_attempts
                {
                    self.check_service_masters(id, now);
                }
            } else {
                let is_volatile = svc.is_volatile;
                self.objects.service_mut(id).state_type = StateType::Hard;
                if hard_change || is_volatile {
                    self.log_service_event(id);
                    state_was_logged = true;
                }

                self.check_for_service_flapping(id, true, now);
                self.check_for_host_flapping(host_id, false, now);
                flapping_checked = true;

                self.notify_service(id, NotificationKind::Normal, now);
                if hard_change || is_volatile {
                    self.run_service_event_handler(id);
                }

                let svc = self.objects.service_mut(id);
                svc.last_hard_state = svc.current_state;
            }

            self.obsess_over_service(id);
        }

        if reschedule {
            self.reschedule_service(id, next_check, now);
        }

        let svc = self.objects.service(id);
        if svc.state_type == StateType::Hard
            && !state_change
            && !state_was_logged
            && svc.plugin_output != old_output
            && svc.stalk_on.contains(&svc.current_state)
        {
            self.log_service_event(id);
        }

        self.hooks.broker(BrokerEvent::ServiceCheckProcessed(self.objects.service(id)));
        self.objects.service_mut(id).has_been_checked = true;
        self.service_status_changed(id);
        if !flapping_checked {
            self.check_for_service_flapping(id, true, now);
        }
        self.hooks.service_perfdata(self.objects.service(id));
    }

    /// Store the parsed output and the state the result maps to. Returns
    /// the previous short output.
    fn apply_service_output(&mut self, id: ServiceId, result: &CheckResult) -> String {
        let timeout_state = self.config.service_check_timeout_state;
        let parsed = parse_check_output(&result.output);
        let exit = CheckExit::of(result);

        let svc = self.objects.service_mut(id);
        svc.last_state = svc.current_state;
        let old_output = std::mem::take(&mut svc.plugin_output);

        svc.plugin_output = if parsed.short.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            sanitize_short_output(&parsed.short)
        };
        svc.long_output = parsed.long;
        svc.perf_data = parsed.perf;

        svc.current_state = match exit {
            CheckExit::Normal(code) => ServiceState::from_code(code).unwrap_or(ServiceState::Unknown),
            CheckExit::TimedOut => {
                svc.plugin_output = timed_out_output("Service", svc.execution_time);
                timeout_state
            }
            CheckExit::Abnormal => {
                svc.plugin_output = abnormal_exit_output("Service");
                ServiceState::Critical
            }
            CheckExit::OutOfBounds(code) => {
                warn!(
                    "Return code of {} for check of service '{}' was out of bounds",
                    code,
                    svc.display_name()
                );
                svc.plugin_output = out_of_bounds_output(code, &sanitize_short_output(&parsed.short));
                ServiceState::Unknown
            }
        };
        old_output
    }

    /// Decide whether the service's host is reachable for this problem
    /// result, using the cached host state or queueing a host check.
    fn resolve_service_route(&mut self, id: ServiceId, state_change: bool, now: DateTime<Utc>) -> HostState {
        let host_id = self.objects.service(id).host;
        let refresh = self.config.execute_host_checks
            && state_change
            && !self.config.cached_state_on_state_change;
        let host = self.objects.host(host_id);

        if host.current_state.is_up() {
            let horizon = Duration::seconds(self.config.cached_host_check_horizon as i64);
            let stale = host.last_check.map_or(true, |last| last + horizon < now);
            if refresh && stale {
                self.schedule_host_check(host_id, now, CheckOptions::DEPENDENCY_CHECK);
                return HostState::Up;
            }
            self.stats.update(CheckStatKind::ActiveOndemandHostCheck, now, now);
            self.stats.update(CheckStatKind::ActiveCachedHostCheck, now, now);
            return host.current_state;
        }

        if refresh {
            self.schedule_host_check(host_id, now, CheckOptions::NONE);
            return HostState::Up;
        }

        // Use the known host state and remind contacts of the outage
        let last_check = self.objects.service(id).last_check;
        let host = self.objects.host_mut(host_id);
        if !host.has_been_checked {
            host.has_been_checked = true;
            host.last_check = last_check;
        }
        let route = host.current_state;
        self.notify_host(host_id, NotificationKind::Normal, now);
        route
    }

    /// Refresh the services this one depends on before it may notify
    fn check_service_masters(&mut self, id: ServiceId, now: DateTime<Utc>) {
        let mut masters = self.objects.service_masters(id, DependencyKind::Execution);
        masters.extend(self.objects.service_masters(id, DependencyKind::Notification));
        for master in masters {
            debug!(
                "Predictive check of service '{}' for '{}'",
                self.objects.service(master).display_name(),
                self.objects.service(id).display_name()
            );
            self.schedule_service_check(master, now, CheckOptions::DEPENDENCY_CHECK);
        }
    }

    fn reschedule_service(&mut self, id: ServiceId, next_check: DateTime<Utc>, now: DateTime<Utc>) {
        let preferred = next_check.max(now);
        let svc = self.objects.service(id);
        let next = self.periods.next_valid_time(preferred, svc.check_period, now);
        let schedulable = svc.check_interval != 0.0 && svc.checks_enabled;

        let svc = self.objects.service_mut(id);
        svc.next_check = Some(next);
        svc.should_be_scheduled = schedulable;
        if schedulable {
            self.schedule_service_check(id, next, CheckOptions::NONE);
        } else {
            debug!(
                "Not rescheduling service '{}': no check interval or checks disabled",
                self.objects.service(id).display_name()
            );
        }
    }
}
