//! Check result transfer object

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::{CheckOptions, CheckType};

/// Outcome of one check, produced by the executor (or a passive submitter)
/// and consumed exactly once by the result processor.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub host_name: String,
    /// Present for service checks, absent for host checks
    pub service_description: Option<String>,
    pub check_type: CheckType,
    pub check_options: CheckOptions,
    /// Launched by the scheduler rather than on demand
    pub scheduled_check: bool,
    /// Whether the processor should queue the next regular check
    pub reschedule_check: bool,
    pub latency: f64,
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
    pub early_timeout: bool,
    pub exited_ok: bool,
    pub return_code: i32,
    /// Raw plugin output, unescaped
    pub output: String,
    /// Spool file this result was read from
    pub output_file: Option<PathBuf>,
}

impl CheckResult {
    fn skeleton(host_name: String, service_description: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            host_name,
            service_description,
            check_type: CheckType::Active,
            check_options: CheckOptions::NONE,
            scheduled_check: true,
            reschedule_check: true,
            latency: 0.0,
            start_time: at,
            finish_time: at,
            early_timeout: false,
            exited_ok: true,
            return_code: 0,
            output: String::new(),
            output_file: None,
        }
    }

    /// Skeleton for an active host check started at `at`
    pub fn for_host(host_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::skeleton(host_name.into(), None, at)
    }

    /// Skeleton for an active service check started at `at`
    pub fn for_service(
        host_name: impl Into<String>,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::skeleton(host_name.into(), Some(description.into()), at)
    }

    /// A submitted host result (`return_code` 0 up, 1 down, 2 unreachable)
    pub fn passive_host(
        host_name: impl Into<String>,
        return_code: i32,
        output: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut result = Self::for_host(host_name, at);
        result.make_passive(return_code, output.into());
        result
    }

    pub fn passive_service(
        host_name: impl Into<String>,
        description: impl Into<String>,
        return_code: i32,
        output: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut result = Self::for_service(host_name, description, at);
        result.make_passive(return_code, output.into());
        result
    }

    fn make_passive(&mut self, return_code: i32, output: String) {
        self.check_type = CheckType::Passive;
        self.scheduled_check = false;
        self.reschedule_check = false;
        self.return_code = return_code;
        self.output = output;
    }

    pub fn is_service_check(&self) -> bool {
        self.service_description.is_some()
    }

    /// Wall-clock duration of the check in seconds, never negative
    pub fn execution_time(&self) -> f64 {
        let micros = (self.finish_time - self.start_time)
            .num_microseconds()
            .unwrap_or(0);
        (micros as f64 / 1_000_000.0).max(0.0)
    }

    /// Human-readable target, `host` or `host/service`
    pub fn target_name(&self) -> String {
        match &self.service_description {
            Some(description) => format!("{}/{}", self.host_name, description),
            None => self.host_name.clone(),
        }
    }
}
