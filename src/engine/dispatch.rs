//! Launching active checks
//!
//! A popped event goes through viability (enabled, check period, execution
//! dependencies), the broker, macro expansion and finally the dispatcher.
//! Refused scheduled checks are put back on the queue at the next valid
//! time.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::{seconds, BrokerEvent, Engine, HookDecision};
use crate::dependency::{DependencyKind, DependencyResolver, MAX_DEPENDENCY_DEPTH};
use crate::executor::macros::resolve_command;
use crate::executor::{expand_command, CheckJob, Completion, MacroContext};
use crate::models::{
    CheckOptions, CheckResult, CheckTarget, HostId, HostState, ServiceId, StateType, TimePeriodId,
};
use crate::monitor::CheckStatKind;

/// Interval used when an entity has no positive check interval
const DEFAULT_RETRY_SECS: f64 = 300.0;

/// How far a check is pushed when its period has no valid time left
const NO_VALID_TIME_FALLBACK_DAYS: i64 = 7;

/// Return code recorded for a host check that timed out
const HOST_TIMEOUT_RETURN_CODE: i32 = 3;

/// A check that may not run now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckRefused {
    /// Earliest instant worth trying again
    pub preferred: DateTime<Utc>,
    /// False when the refusal came from the check period
    pub time_is_valid: bool,
}

impl CheckRefused {
    fn at(preferred: DateTime<Utc>) -> Self {
        Self {
            preferred,
            time_is_valid: true,
        }
    }
}

fn retry_delay(interval_secs: f64) -> Duration {
    if interval_secs <= 0.0 {
        seconds(DEFAULT_RETRY_SECS)
    } else {
        seconds(interval_secs)
    }
}

impl Engine {
    fn at_concurrency_limit(&self) -> bool {
        self.config.max_concurrent_checks > 0
            && self.running_service_checks >= self.config.max_concurrent_checks
    }

    /// Launch every check due at `now`. Returns how many were dispatched.
    pub fn run_due_checks(&mut self, now: DateTime<Utc>) -> usize {
        let mut launched = 0;
        while let Some(check) = self.events.pop_due(now) {
            let latency = (now - check.due).num_milliseconds().max(0) as f64 / 1000.0;
            let started = match check.target {
                CheckTarget::Service(id) => {
                    if self.at_concurrency_limit() {
                        let deferred = now + Duration::seconds(self.config.check_deferral.max(1) as i64);
                        debug!(
                            "Max concurrent service checks ({}) reached, deferring '{}' to {}",
                            self.config.max_concurrent_checks,
                            self.objects.service(id).display_name(),
                            deferred
                        );
                        self.events.insert(check.target, deferred, check.options);
                        self.objects.service_mut(id).next_check = Some(deferred);
                        continue;
                    }
                    self.run_scheduled_service_check(id, check.options, latency, now)
                }
                CheckTarget::Host(id) => self.run_scheduled_host_check(id, check.options, latency, now),
            };
            if started {
                launched += 1;
            }
        }
        launched
    }

    /// Run a scheduled service check, rescheduling it when refused
    pub fn run_scheduled_service_check(
        &mut self,
        id: ServiceId,
        options: CheckOptions,
        latency: f64,
        now: DateTime<Utc>,
    ) -> bool {
        match self.run_async_service_check(id, options, latency, true, true, now) {
            Ok(()) => true,
            Err(refused) => {
                self.reschedule_refused_service(id, options, refused, now);
                false
            }
        }
    }

    pub fn run_scheduled_host_check(
        &mut self,
        id: HostId,
        options: CheckOptions,
        latency: f64,
        now: DateTime<Utc>,
    ) -> bool {
        match self.run_async_host_check(id, options, latency, true, true, now) {
            Ok(()) => true,
            Err(refused) => {
                self.reschedule_refused_host(id, options, refused, now);
                false
            }
        }
    }

    /// Next instant a refused check may run: one interval out if the
    /// preferred time has already passed, moved into the check period,
    /// and a week out if the period has no valid time left.
    fn retry_time(
        &self,
        refused: CheckRefused,
        interval_secs: f64,
        period: Option<TimePeriodId>,
        name: &str,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let mut preferred = refused.preferred;
        if now >= preferred {
            preferred = now + retry_delay(interval_secs);
        }
        let next = self.periods.next_valid_time(preferred, period, now);
        if !refused.time_is_valid && !self.periods.is_time_in_period(next, period) {
            warn!(
                "Check of '{}' could not be rescheduled properly, scheduling it for next week",
                name
            );
            return next + Duration::days(NO_VALID_TIME_FALLBACK_DAYS);
        }
        next
    }

    fn reschedule_refused_service(
        &mut self,
        id: ServiceId,
        options: CheckOptions,
        refused: CheckRefused,
        now: DateTime<Utc>,
    ) {
        let svc = self.objects.service(id);
        let next = self.retry_time(
            refused,
            svc.active_interval_secs(self.config.interval_length),
            svc.check_period,
            &svc.display_name(),
            now,
        );
        let svc = self.objects.service_mut(id);
        svc.next_check = Some(next);
        if svc.should_be_scheduled {
            self.schedule_service_check(id, next, options);
        }
        self.service_status_changed(id);
    }

    fn reschedule_refused_host(
        &mut self,
        id: HostId,
        options: CheckOptions,
        refused: CheckRefused,
        now: DateTime<Utc>,
    ) {
        let host = self.objects.host(id);
        let next = self.retry_time(
            refused,
            host.active_interval_secs(self.config.interval_length),
            host.check_period,
            &host.name,
            now,
        );
        let host = self.objects.host_mut(id);
        host.next_check = Some(next);
        if host.should_be_scheduled {
            self.schedule_host_check(id, next, options);
        }
        self.host_status_changed(id);
    }

    /// Whether a service check may run now
    pub fn check_service_viability(
        &self,
        id: ServiceId,
        options: CheckOptions,
        now: DateTime<Utc>,
    ) -> Result<(), CheckRefused> {
        let svc = self.objects.service(id);
        let retry = now + retry_delay(svc.active_interval_secs(self.config.interval_length));
        let resolver = DependencyResolver::new(
            &self.objects,
            &self.periods,
            self.config.soft_state_dependencies,
            now,
        );

        if svc.check_command.is_none() {
            debug!("Service '{}' has no check command", svc.display_name());
            return Err(CheckRefused::at(retry));
        }
        if !options.is_forced() {
            if svc.is_executing {
                debug!("Service '{}' is already being checked", svc.display_name());
                return Err(CheckRefused::at(retry));
            }
            if !self.config.execute_service_checks || !svc.checks_enabled {
                return Err(CheckRefused::at(retry));
            }
            if !self.periods.is_time_in_period(now, svc.check_period) {
                return Err(CheckRefused {
                    preferred: now,
                    time_is_valid: false,
                });
            }
            if !resolver.check_service(id, DependencyKind::Execution).is_ok() {
                debug!(
                    "Execution dependencies of service '{}' failed",
                    svc.display_name()
                );
                return Err(CheckRefused::at(retry));
            }
        }
        if !resolver.check_service_parents(id).is_ok() {
            debug!("A parent of service '{}' is failing", svc.display_name());
            return Err(CheckRefused::at(retry));
        }
        if self.config.host_down_disable_service_checks
            && !self.objects.host(svc.host).current_state.is_up()
        {
            debug!(
                "Host of service '{}' is not up, skipping the check",
                svc.display_name()
            );
            return Err(CheckRefused::at(retry));
        }
        Ok(())
    }

    /// Whether a host check may run now
    pub fn check_host_viability(
        &self,
        id: HostId,
        options: CheckOptions,
        now: DateTime<Utc>,
    ) -> Result<(), CheckRefused> {
        if options.is_forced() {
            return Ok(());
        }
        let host = self.objects.host(id);
        let retry = now + retry_delay(host.active_interval_secs(self.config.interval_length));

        if !self.config.execute_host_checks || !host.checks_enabled {
            return Err(CheckRefused::at(retry));
        }
        if !self.periods.is_time_in_period(now, host.check_period) {
            return Err(CheckRefused {
                preferred: now,
                time_is_valid: false,
            });
        }
        let resolver = DependencyResolver::new(
            &self.objects,
            &self.periods,
            self.config.soft_state_dependencies,
            now,
        );
        if !resolver.check_host(id, DependencyKind::Execution).is_ok() {
            debug!("Execution dependencies of host '{}' failed", host.name);
            return Err(CheckRefused::at(retry));
        }
        Ok(())
    }

    /// Apply a broker verdict on a check about to start. `Ok(true)` means
    /// carry on, `Ok(false)` means the broker took over.
    fn broker_check_decision(
        &mut self,
        decision: HookDecision,
        retry: DateTime<Utc>,
    ) -> Result<bool, CheckRefused> {
        match decision {
            HookDecision::Proceed => Ok(true),
            HookDecision::Cancel => Err(CheckRefused::at(retry)),
            HookDecision::Override { substitute } => {
                if let Some(result) = substitute {
                    self.results.push(result);
                }
                Ok(false)
            }
        }
    }

    /// Start an asynchronous service check. On refusal nothing has been
    /// launched and the caller decides whether to reschedule.
    pub fn run_async_service_check(
        &mut self,
        id: ServiceId,
        options: CheckOptions,
        latency: f64,
        scheduled: bool,
        reschedule: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CheckRefused> {
        self.check_service_viability(id, options, now)?;

        let retry = now
            + retry_delay(
                self.objects
                    .service(id)
                    .active_interval_secs(self.config.interval_length),
            );
        let decision = self
            .hooks
            .broker(BrokerEvent::ServiceCheckPrecheck(self.objects.service(id)));
        if !self.broker_check_decision(decision, retry)? {
            return Ok(());
        }

        if scheduled {
            self.objects.service_mut(id).check_options = CheckOptions::NONE;
        }

        let svc = self.objects.service(id);
        let host = self.objects.host(svc.host);
        let (template, args) =
            resolve_command(svc.check_command.as_deref().unwrap_or_default(), &self.objects.commands);
        let command_line = expand_command(&template, &MacroContext::for_service(host, svc, args));

        let decision = self.hooks.broker(BrokerEvent::ServiceCheckInitiate {
            service: svc,
            command_line: &command_line,
        });
        if !self.broker_check_decision(decision, retry)? {
            return Ok(());
        }

        let svc = self.objects.service(id);
        let mut skeleton = CheckResult::for_service(&svc.host_name, &svc.description, now);
        skeleton.check_options = options;
        skeleton.scheduled_check = scheduled;
        skeleton.reschedule_check = reschedule;
        skeleton.latency = latency;

        let job = CheckJob {
            target: CheckTarget::Service(id),
            command_line,
            timeout: std::time::Duration::from_secs(self.config.service_check_timeout),
            timeout_return_code: self.config.service_timeout_return_code(),
            skeleton,
        };
        debug!(
            "Running check of service '{}': {}",
            svc.display_name(),
            job.command_line
        );
        if let Err(e) = self.dispatcher.dispatch(job) {
            warn!(
                "Could not start check of service '{}': {:#}",
                self.objects.service(id).display_name(),
                e
            );
            return Err(CheckRefused::at(now));
        }

        self.running_service_checks += 1;
        self.objects.service_mut(id).is_executing = true;
        let kind = if scheduled {
            CheckStatKind::ActiveScheduledServiceCheck
        } else {
            CheckStatKind::ActiveOndemandServiceCheck
        };
        self.stats.update(kind, now, now);
        Ok(())
    }

    /// Start an asynchronous host check. A host without a check command
    /// gets an immediate synthetic result instead of a process.
    pub fn run_async_host_check(
        &mut self,
        id: HostId,
        options: CheckOptions,
        latency: f64,
        scheduled: bool,
        reschedule: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CheckRefused> {
        let host = self.objects.host(id);
        if !options.is_forced() {
            if host.is_executing {
                debug!("Host '{}' is already being checked", host.name);
                return Err(CheckRefused::at(now));
            }
            let horizon = Duration::seconds(self.config.cached_host_check_horizon as i64);
            if host.last_check.is_some_and(|last| last + horizon > now) {
                debug!(
                    "Last result of host '{}' is recent enough, not checking again",
                    host.name
                );
                self.stats.update(CheckStatKind::ActiveCachedHostCheck, now, now);
                return Err(CheckRefused::at(now));
            }
        }
        self.check_host_viability(id, options, now)?;

        let retry = now
            + retry_delay(
                self.objects
                    .host(id)
                    .active_interval_secs(self.config.interval_length),
            );
        let decision = self
            .hooks
            .broker(BrokerEvent::HostCheckPrecheck(self.objects.host(id)));
        if !self.broker_check_decision(decision, retry)? {
            return Ok(());
        }

        if scheduled {
            self.objects.host_mut(id).check_options = CheckOptions::NONE;
        }
        self.adjust_host_check_attempt(id, true);

        let host = self.objects.host(id);
        let command_line = host.check_command.as_deref().map(|check_command| {
            let (template, args) = resolve_command(check_command, &self.objects.commands);
            expand_command(&template, &MacroContext::for_host(host, args))
        });

        let decision = self.hooks.broker(BrokerEvent::HostCheckInitiate {
            host,
            command_line: command_line.as_deref().unwrap_or_default(),
        });
        if !self.broker_check_decision(decision, retry)? {
            return Ok(());
        }

        let host = self.objects.host(id);
        let mut skeleton = CheckResult::for_host(&host.name, now);
        skeleton.check_options = options;
        skeleton.scheduled_check = scheduled;
        skeleton.reschedule_check = reschedule;
        skeleton.latency = latency;

        match command_line {
            None => {
                debug!("Host '{}' has no check command, assuming it is up", host.name);
                self.results.push(skeleton);
            }
            Some(command_line) => {
                let job = CheckJob {
                    target: CheckTarget::Host(id),
                    command_line,
                    timeout: std::time::Duration::from_secs(self.config.host_check_timeout),
                    timeout_return_code: HOST_TIMEOUT_RETURN_CODE,
                    skeleton,
                };
                debug!("Running check of host '{}': {}", host.name, job.command_line);
                if let Err(e) = self.dispatcher.dispatch(job) {
                    warn!(
                        "Could not start check of host '{}': {:#}",
                        self.objects.host(id).name,
                        e
                    );
                    return Err(CheckRefused::at(now));
                }
            }
        }

        self.running_host_checks += 1;
        self.objects.host_mut(id).is_executing = true;
        let kind = if scheduled {
            CheckStatKind::ActiveScheduledHostCheck
        } else {
            CheckStatKind::ActiveOndemandHostCheck
        };
        self.stats.update(kind, now, now);
        self.stats.update(CheckStatKind::ParallelHostCheck, now, now);
        Ok(())
    }

    /// Move the host's attempt counter ahead of a new check result
    pub(crate) fn adjust_host_check_attempt(&mut self, id: HostId, active: bool) {
        let host = self.objects.host_mut(id);
        let up = host.current_state.is_up();
        if host.state_type == StateType::Hard && up {
            host.current_attempt = 1;
        } else if active && host.state_type == StateType::Soft && up {
            host.current_attempt = 1;
        } else if host.current_attempt < host.max_attempts {
            host.current_attempt += 1;
        }
    }

    /// Check a host on the calling thread and apply the result before
    /// returning. Only reachability of hosts with a single attempt uses
    /// this; everything else goes through the dispatcher.
    pub(crate) fn execute_sync_host_check(
        &mut self,
        id: HostId,
        now: DateTime<Utc>,
        depth: usize,
    ) -> HostState {
        if depth > MAX_DEPENDENCY_DEPTH {
            warn!(
                "Synchronous check chain of host '{}' exceeds {} levels",
                self.objects.host(id).name,
                MAX_DEPENDENCY_DEPTH
            );
            return self.objects.host(id).current_state;
        }

        self.adjust_host_check_attempt(id, true);
        let host = self.objects.host(id);
        let mut result = CheckResult::for_host(&host.name, now);
        result.scheduled_check = false;
        if let Some(check_command) = host.check_command.as_deref() {
            let (template, args) = resolve_command(check_command, &self.objects.commands);
            let job = CheckJob {
                target: CheckTarget::Host(id),
                command_line: expand_command(&template, &MacroContext::for_host(host, args)),
                timeout: std::time::Duration::from_secs(self.config.host_check_timeout),
                timeout_return_code: HOST_TIMEOUT_RETURN_CODE,
                skeleton: result,
            };
            debug!("Running serial check of host '{}'", host.name);
            result = self.dispatcher.run_sync(job);
            // Keep the result on the engine clock
            let elapsed = result.finish_time - result.start_time;
            result.start_time = now;
            result.finish_time = now + elapsed;
        }

        self.running_host_checks += 1;
        self.objects.host_mut(id).is_executing = true;
        self.stats.update(CheckStatKind::ActiveOndemandHostCheck, now, now);
        self.stats.update(CheckStatKind::SerialHostCheck, now, now);
        self.apply_host_result(id, result, now, depth + 1);
        self.objects.host(id).current_state
    }

    /// React to a worker finishing. A committed result is picked up by the
    /// next reaper pass; a failed check is rescheduled.
    pub(crate) fn handle_completion(&mut self, completion: Completion, now: DateTime<Utc>) {
        match completion {
            Completion::Committed(target) => {
                debug!("Result for {:?} committed", target);
                self.timers.reap_requested = true;
            }
            Completion::Failed { target, reason } => {
                warn!("Check of {:?} produced no result: {}", target, reason);
                let refused = CheckRefused::at(now);
                match target {
                    CheckTarget::Service(id) => {
                        self.running_service_checks = self.running_service_checks.saturating_sub(1);
                        self.objects.service_mut(id).is_executing = false;
                        self.reschedule_refused_service(id, CheckOptions::NONE, refused, now);
                    }
                    CheckTarget::Host(id) => {
                        self.running_host_checks = self.running_host_checks.saturating_sub(1);
                        self.objects.host_mut(id).is_executing = false;
                        self.reschedule_refused_host(id, CheckOptions::NONE, refused, now);
                    }
                }
            }
        }
    }
}
