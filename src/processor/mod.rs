//! Check result processing
//!
//! Results are taken from the result queue in finish-time order, matched
//! to their host or service by name, shown to the broker and then run
//! through the soft/hard state machine of [`service`] or [`host`].

mod flapping;
mod host;
pub mod output;
pub mod return_code;
mod service;

#[cfg(test)]
mod tests_host;
#[cfg(test)]
mod tests_service;

pub use flapping::{flap_decision, percent_state_change};
pub use output::{parse_check_output, ParsedOutput};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::engine::{seconds, BrokerEvent, Engine, HookDecision};
use crate::models::{CheckOptions, CheckResult, CheckTarget, CheckType};

impl Engine {
    /// Length of `units` interval units
    fn interval(&self, units: f64) -> Duration {
        seconds(units * self.config.interval_length as f64)
    }

    /// Apply one result. Returns false when it was discarded before
    /// reaching the state machine.
    pub fn process_result(&mut self, result: CheckResult, now: DateTime<Utc>) -> bool {
        let target = match &result.service_description {
            Some(description) => match self.objects.find_service(&result.host_name, description) {
                Some(id) => CheckTarget::Service(id),
                None => {
                    warn!(
                        "Discarding check result for service '{}' on host '{}': no such service",
                        description, result.host_name
                    );
                    return false;
                }
            },
            None => match self.objects.find_host(&result.host_name) {
                Some(id) => CheckTarget::Host(id),
                None => {
                    warn!(
                        "Discarding check result for host '{}': no such host",
                        result.host_name
                    );
                    return false;
                }
            },
        };

        let decision = match target {
            CheckTarget::Service(id) => self.hooks.broker(BrokerEvent::ServiceResult {
                service: self.objects.service(id),
                result: &result,
            }),
            CheckTarget::Host(id) => self.hooks.broker(BrokerEvent::HostResult {
                host: self.objects.host(id),
                result: &result,
            }),
        };

        let result = match decision {
            HookDecision::Proceed => result,
            HookDecision::Override {
                substitute: Some(substitute),
            } => {
                debug!("Broker substituted the result for {}", result.target_name());
                substitute
            }
            HookDecision::Cancel | HookDecision::Override { substitute: None } => {
                debug!("Broker discarded the result for {}", result.target_name());
                self.release_discarded(target, &result, now);
                return false;
            }
        };

        match target {
            CheckTarget::Service(id) => self.handle_service_result(id, result, now),
            CheckTarget::Host(id) => self.handle_host_result(id, result, now),
        }
        true
    }

    /// Apply every queued result. Returns how many reached the state machine.
    pub fn process_results(&mut self, now: DateTime<Utc>) -> usize {
        let mut processed = 0;
        while let Some(result) = self.results.pop() {
            if self.process_result(result, now) {
                processed += 1;
            }
        }
        processed
    }

    /// Undo the in-flight bookkeeping of an active check whose result was
    /// dropped, and queue its next regular check
    fn release_discarded(&mut self, target: CheckTarget, result: &CheckResult, now: DateTime<Utc>) {
        if result.check_type != CheckType::Active {
            return;
        }
        let interval_length = self.config.interval_length;
        match target {
            CheckTarget::Service(id) => {
                self.running_service_checks = self.running_service_checks.saturating_sub(1);
                let svc = self.objects.service_mut(id);
                svc.is_executing = false;
                let next = now + seconds(svc.active_interval_secs(interval_length));
                if result.reschedule_check {
                    self.schedule_service_check(id, next, CheckOptions::NONE);
                }
            }
            CheckTarget::Host(id) => {
                self.running_host_checks = self.running_host_checks.saturating_sub(1);
                let host = self.objects.host_mut(id);
                host.is_executing = false;
                let next = now + seconds(host.active_interval_secs(interval_length));
                if result.reschedule_check {
                    self.schedule_host_check(id, next, CheckOptions::NONE);
                }
            }
        }
    }
}
