//! Host result handling
//!
//! Active results are translated to UP or DOWN first (WARNING counts as
//! UP unless aggressive host checking is on). A DOWN host is then told
//! apart from an UNREACHABLE one by looking at its parents. Active host
//! attempts are advanced before the check is launched, so a result is
//! processed with `current_attempt` already naming the attempt it belongs
//! to.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::output::{parse_check_output, sanitize_short_output};
use super::return_code::{abnormal_exit_output, out_of_bounds_output, timed_out_output, CheckExit};
use crate::dependency::DependencyKind;
use crate::engine::{BrokerEvent, Engine, NotificationKind};
use crate::models::{
    AcknowledgementType, CheckOptions, CheckResult, CheckType, HostId, HostState, ServiceState,
    StateType,
};
use crate::monitor::CheckStatKind;

const NO_OUTPUT: &str = "(No output returned from host check)";
const ASSUMED_UP_OUTPUT: &str = "(Host assumed to be UP)";

impl Engine {
    /// Apply one host check result
    pub fn handle_host_result(&mut self, id: HostId, result: CheckResult, now: DateTime<Utc>) {
        self.apply_host_result(id, result, now, 0);
    }

    /// `depth` counts nested synchronous parent checks
    pub(crate) fn apply_host_result(
        &mut self,
        id: HostId,
        result: CheckResult,
        now: DateTime<Utc>,
        depth: usize,
    ) {
        let active = result.check_type == CheckType::Active;
        let freshness_check = result.check_options.contains(CheckOptions::FRESHNESS_CHECK);

        if active {
            self.running_host_checks = self.running_host_checks.saturating_sub(1);
        } else {
            let host = self.objects.host(id);
            if !self.config.accept_passive_host_checks || !host.accept_passive_checks {
                debug!(
                    "Discarding passive result for host '{}': passive checks are disabled",
                    host.name
                );
                return;
            }
        }

        if freshness_check {
            self.objects.host_mut(id).is_being_freshened = false;
            if self.is_host_result_fresh(id, now, false) {
                debug!(
                    "Discarding freshness check result of host '{}': it is fresh again",
                    self.objects.host(id).name
                );
                if active {
                    self.objects.host_mut(id).is_executing = false;
                }
                return;
            }
        }

        let check_time = result.start_time;
        if !active {
            self.stats.update(CheckStatKind::PassiveHostCheck, check_time, now);
        }

        let host = self.objects.host_mut(id);
        host.check_type = result.check_type;
        host.latency = result.latency;
        host.execution_time = result.execution_time();
        host.has_been_checked = true;
        if active {
            host.is_executing = false;
        }
        host.last_check = Some(check_time);
        host.last_state = host.current_state;
        if host.state_type == StateType::Hard {
            host.last_hard_state = host.current_state;
        }

        let old_output = std::mem::take(&mut host.plugin_output);
        let parsed = parse_check_output(&result.output);
        host.plugin_output = if parsed.short.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            sanitize_short_output(&parsed.short)
        };
        host.long_output = parsed.long;
        host.perf_data = parsed.perf;

        let new_state = if active {
            let service_state = match CheckExit::of(&result) {
                CheckExit::Normal(code) => ServiceState::from_code(code).unwrap_or(ServiceState::Unknown),
                CheckExit::TimedOut => {
                    host.plugin_output = timed_out_output("Host", host.execution_time);
                    ServiceState::Unknown
                }
                CheckExit::Abnormal => {
                    host.plugin_output = abnormal_exit_output("Host");
                    ServiceState::Critical
                }
                CheckExit::OutOfBounds(code) => {
                    warn!(
                        "Return code of {} for check of host '{}' was out of bounds",
                        code, host.name
                    );
                    host.plugin_output =
                        out_of_bounds_output(code, &sanitize_short_output(&parsed.short));
                    ServiceState::Unknown
                }
            };
            let service_state = if host.check_command.is_none() {
                host.plugin_output = ASSUMED_UP_OUTPUT.to_string();
                ServiceState::Ok
            } else {
                service_state
            };
            self.translate_host_check(service_state)
        } else {
            HostState::from_passive_code(result.return_code)
        };

        self.process_host_check_result(id, new_state, &old_output, result.reschedule_check, now, depth);
        self.hooks.broker(BrokerEvent::HostCheckProcessed(self.objects.host(id)));
    }

    /// Map a plugin state onto a raw host state
    fn translate_host_check(&self, state: ServiceState) -> HostState {
        match state {
            ServiceState::Ok => HostState::Up,
            ServiceState::Warning if !self.config.use_aggressive_host_checking => HostState::Up,
            _ => HostState::Down,
        }
    }

    /// Settle state type, reachability and the next check for a host given
    /// the raw state of its latest result
    pub(crate) fn process_host_check_result(
        &mut self,
        id: HostId,
        new_state: HostState,
        old_output: &str,
        reschedule: bool,
        now: DateTime<Utc>,
        depth: usize,
    ) {
        let mut reschedule = reschedule;
        let passive = self.objects.host(id).check_type == CheckType::Passive;
        let passive_is_soft = self.config.passive_host_checks_are_soft;
        let translate = !passive || self.config.translate_passive_host_checks;
        let mut next_check = now + self.interval(self.objects.host(id).check_interval);

        if passive && passive_is_soft {
            self.adjust_host_check_attempt(id, false);
        }
        if passive && self.config.log_passive_checks {
            let host = self.objects.host(id);
            info!(
                "PASSIVE HOST CHECK: {};{};{}",
                host.name,
                new_state.code(),
                host.plugin_output
            );
        }

        let host = self.objects.host(id);
        let (check_interval, retry_interval) = (host.check_interval, host.retry_interval);

        if !host.current_state.is_up() {
            if new_state.is_up() {
                let host = self.objects.host_mut(id);
                host.current_state = HostState::Up;
                host.state_type = if host.state_type == StateType::Hard || (passive && !passive_is_soft) {
                    StateType::Hard
                } else {
                    StateType::Soft
                };
                reschedule = true;
                next_check = now + self.interval(check_interval);

                // The route may be back for hosts behind this one
                let host = self.objects.host(id);
                let stale: Vec<HostId> = host
                    .parents
                    .iter()
                    .chain(host.children.iter())
                    .copied()
                    .filter(|&other| !self.objects.host(other).current_state.is_up())
                    .collect();
                for other in stale {
                    self.schedule_host_check(other, now, CheckOptions::DEPENDENCY_CHECK);
                }
            } else {
                let host = self.objects.host_mut(id);
                if passive && !passive_is_soft {
                    host.state_type = StateType::Hard;
                    host.current_attempt = 1;
                } else if host.current_attempt >= host.max_attempts {
                    host.state_type = StateType::Hard;
                } else {
                    host.state_type = StateType::Soft;
                }
                host.current_state = new_state;
                if translate {
                    let reachability = self.resolve_reachability(id, now, depth);
                    self.objects.host_mut(id).current_state = reachability;
                }

                let host = self.objects.host(id);
                if host.last_state != host.current_state || host.last_hard_state != host.current_state {
                    reschedule = true;
                    let units = if host.state_type == StateType::Soft {
                        retry_interval
                    } else {
                        check_interval
                    };
                    next_check = now + self.interval(units);
                }
            }
        } else if new_state.is_up() {
            self.objects.host_mut(id).state_type = StateType::Hard;
            if reschedule {
                next_check = now + self.interval(check_interval);
            }
        } else {
            let counts_attempts = !passive || passive_is_soft;
            let host = self.objects.host_mut(id);
            if !counts_attempts {
                host.state_type = StateType::Hard;
                host.current_attempt = 1;
            } else if host.current_attempt >= host.max_attempts {
                host.state_type = StateType::Hard;
            } else {
                host.state_type = StateType::Soft;
            }
            host.current_state = new_state;
            if translate {
                let reachability = self.resolve_reachability(id, now, depth);
                self.objects.host_mut(id).current_state = reachability;
            }

            reschedule = true;
            next_check = now + self.interval(if counts_attempts { retry_interval } else { check_interval });

            // Parents may have taken the route down; children may be cut off
            let host = self.objects.host(id);
            let up_parents: Vec<HostId> = host
                .parents
                .iter()
                .copied()
                .filter(|&parent| self.objects.host(parent).current_state.is_up())
                .collect();
            let reachable_children: Vec<HostId> = host
                .children
                .iter()
                .copied()
                .filter(|&child| self.objects.host(child).current_state != HostState::Unreachable)
                .collect();
            for parent in up_parents {
                self.schedule_host_check(parent, now, CheckOptions::DEPENDENCY_CHECK);
            }
            for child in reachable_children {
                self.schedule_host_check(child, now, CheckOptions::NONE);
            }

            let host = self.objects.host(id);
            if self.config.enable_predictive_host_dependency_checks
                && host.current_attempt + 1 == host.max_attempts
            {
                self.check_host_masters(id, now);
            }
        }

        self.handle_host_state(id, now);

        let host = self.objects.host(id);
        if host.last_state == host.current_state
            && host.stalk_on.contains(&host.current_state)
            && host.plugin_output != old_output
        {
            self.log_host_event(id);
        }

        self.check_for_host_flapping(id, true, now);

        if reschedule {
            self.reschedule_host(id, next_check, now);
        }
        self.host_status_changed(id);
    }

    /// Classify a host that is not UP. With a single attempt there is no
    /// retry to correct a wrong guess, so its parents are checked right
    /// away on this thread.
    fn resolve_reachability(&mut self, id: HostId, now: DateTime<Utc>, depth: usize) -> HostState {
        let host = self.objects.host(id);
        if host.check_type == CheckType::Active && host.max_attempts == 1 {
            let parents: Vec<HostId> = host
                .parents
                .iter()
                .copied()
                .filter(|&parent| !self.objects.host(parent).is_executing)
                .collect();
            for parent in parents {
                debug!(
                    "Checking parent '{}' of single-attempt host '{}' serially",
                    self.objects.host(parent).name,
                    self.objects.host(id).name
                );
                self.execute_sync_host_check(parent, now, depth);
            }
        }
        self.determine_host_reachability(id)
    }

    /// DOWN or UNREACHABLE for a host that is not UP: a host is only DOWN
    /// if it has no parents or at least one of them is UP.
    pub fn determine_host_reachability(&self, id: HostId) -> HostState {
        let host = self.objects.host(id);
        if host.current_state.is_up() {
            return HostState::Up;
        }
        if host.check_type == CheckType::Passive && host.current_state == HostState::Unreachable {
            return HostState::Unreachable;
        }
        if host.parents.is_empty() {
            return HostState::Down;
        }
        if let Some(&parent) = host
            .parents
            .iter()
            .find(|&&parent| self.objects.host(parent).current_state.is_up())
        {
            debug!(
                "Parent '{}' of host '{}' is UP, so the host is DOWN",
                self.objects.host(parent).name,
                host.name
            );
            return HostState::Down;
        }
        debug!("No parent of host '{}' is UP, so it is UNREACHABLE", host.name);
        HostState::Unreachable
    }

    /// Alerts, ids, notifications and the event handler once the state of
    /// a host is settled
    pub(crate) fn handle_host_state(&mut self, id: HostId, now: DateTime<Utc>) {
        self.obsess_over_host(id);
        self.hooks.host_perfdata(self.objects.host(id));

        let host = self.objects.host_mut(id);
        match host.last_state {
            HostState::Up => host.last_time_up = Some(now),
            HostState::Down => host.last_time_down = Some(now),
            HostState::Unreachable => host.last_time_unreachable = Some(now),
        }

        let state_change = host.last_state != host.current_state
            || (host.current_state.is_up() && host.state_type == StateType::Soft);
        let mut hard_change =
            host.current_attempt >= host.max_attempts && host.last_hard_state != host.current_state;

        if state_change || hard_change {
            host.notifications.reset_times();
            match host.acknowledgement {
                AcknowledgementType::Normal if state_change || !hard_change => {
                    host.acknowledgement = AcknowledgementType::None;
                }
                AcknowledgementType::Sticky if host.current_state.is_up() => {
                    host.acknowledgement = AcknowledgementType::None;
                }
                _ => {}
            }
        }

        // Any move away from the last hard state counts as a change here
        if host.last_hard_state != host.current_state {
            hard_change = true;
        }

        if state_change || hard_change {
            host.last_state_change = Some(now);
            if host.state_type == StateType::Hard {
                host.last_hard_state_change = Some(now);
            }

            let event_id = self.next_event_id();
            let problem_id = if self.objects.host(id).last_state.is_up() {
                Some(self.next_problem_id())
            } else {
                None
            };
            let host = self.objects.host_mut(id);
            host.ids.last_event_id = host.ids.current_event_id;
            host.ids.current_event_id = event_id;
            if let Some(problem_id) = problem_id {
                host.ids.current_problem_id = problem_id;
            }
            if host.current_state.is_up() {
                host.ids.last_problem_id = host.ids.current_problem_id;
                host.ids.current_problem_id = 0;
            }

            let state_type = host.state_type;
            if state_type == StateType::Hard || self.config.log_host_retries {
                self.log_host_event(id);
            }
            if state_type == StateType::Hard {
                self.notify_host(id, NotificationKind::Normal, now);
            }
            self.run_host_event_handler(id);

            let host = self.objects.host_mut(id);
            if host.current_state.is_up() {
                host.current_attempt = 1;
                host.notifications.current_number = 0;
            }
        } else {
            let host = self.objects.host(id);
            let (problem, state_type) = (!host.current_state.is_up(), host.state_type);
            if problem && state_type == StateType::Hard {
                self.notify_host(id, NotificationKind::Normal, now);
            }
            if state_type == StateType::Soft && self.config.log_host_retries {
                self.log_host_event(id);
            }
        }
    }

    /// Refresh the hosts this one depends on before it may notify
    fn check_host_masters(&mut self, id: HostId, now: DateTime<Utc>) {
        let mut masters = self.objects.host_masters(id, DependencyKind::Notification);
        masters.extend(self.objects.host_masters(id, DependencyKind::Execution));
        for master in masters {
            debug!(
                "Predictive check of host '{}' for '{}'",
                self.objects.host(master).name,
                self.objects.host(id).name
            );
            self.schedule_host_check(master, now, CheckOptions::NONE);
        }
    }

    fn reschedule_host(&mut self, id: HostId, next_check: DateTime<Utc>, now: DateTime<Utc>) {
        let preferred = next_check.max(now);
        let host = self.objects.host(id);
        let next = self.periods.next_valid_time(preferred, host.check_period, now);
        // A non-recurring check stops once the host has settled
        let settled = host.state_type == StateType::Hard || host.current_state.is_up();
        let schedulable = !(host.check_interval == 0.0 && settled) && host.checks_enabled;

        let host = self.objects.host_mut(id);
        host.next_check = Some(next);
        host.should_be_scheduled = schedulable;
        if schedulable {
            self.schedule_host_check(id, next, CheckOptions::NONE);
        }
    }
}
