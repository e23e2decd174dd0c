//! Fire-and-forget check launching

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

use super::{ExecutionOutcome, ExecutorRegistry};
use crate::models::{CheckResult, CheckTarget};
use crate::queue::Spool;

/// A check ready to run
#[derive(Debug, Clone)]
pub struct CheckJob {
    pub target: CheckTarget,
    /// Fully expanded command line
    pub command_line: String,
    pub timeout: Duration,
    /// Return code recorded when the command times out
    pub timeout_return_code: i32,
    /// Identity, options and latency filled in at dispatch time
    pub skeleton: CheckResult,
}

impl CheckJob {
    /// Merge the executor outcome into the skeleton result
    fn into_result(self, outcome: ExecutionOutcome) -> CheckResult {
        let mut result = self.skeleton;
        result.start_time = outcome.start_time;
        result.finish_time = outcome.finish_time;
        result.early_timeout = outcome.early_timeout;
        result.exited_ok = outcome.exited_ok;
        result.return_code = if outcome.early_timeout {
            self.timeout_return_code
        } else {
            outcome.return_code
        };
        result.output = outcome.output;
        result
    }
}

/// Message sent to the main loop when a dispatched check is done with
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The result is durably in the spool
    Committed(CheckTarget),
    /// The check could not be run or its result could not be stored
    Failed { target: CheckTarget, reason: String },
}

/// Runs checks on worker threads and reports completions over a channel
pub struct Dispatcher {
    executors: ExecutorRegistry,
    spool: Spool,
    completions: Sender<Completion>,
}

impl Dispatcher {
    pub fn new(executors: ExecutorRegistry, spool: Spool) -> (Self, Receiver<Completion>) {
        let (completions, receiver) = mpsc::channel();
        (
            Self {
                executors,
                spool,
                completions,
            },
            receiver,
        )
    }

    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    /// Start `job` on its own thread and return immediately
    pub fn dispatch(&self, job: CheckJob) -> Result<()> {
        let executors = self.executors.clone();
        let spool = self.spool.clone();
        let completions = self.completions.clone();
        let name = format!("check-{}", job.skeleton.target_name());

        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let target = job.target;
                let completion = match run_job(&executors, &spool, job) {
                    Ok(()) => Completion::Committed(target),
                    Err(e) => {
                        error!("Check for {:?} failed: {:#}", target, e);
                        Completion::Failed {
                            target,
                            reason: format!("{e:#}"),
                        }
                    }
                };
                // The receiver is gone only during shutdown
                let _ = completions.send(completion);
            })
            .context("Failed to start check worker thread")?;
        Ok(())
    }

    /// Run `job` on the calling thread and hand the result back directly,
    /// bypassing the spool. Execution errors become a result that did not
    /// exit properly.
    pub fn run_sync(&self, job: CheckJob) -> CheckResult {
        match self.executors.execute(&job.command_line, job.timeout) {
            Ok(outcome) => job.into_result(outcome),
            Err(e) => {
                let now = Utc::now();
                let mut result = job.skeleton;
                result.start_time = now;
                result.finish_time = now;
                result.exited_ok = false;
                result.return_code = 3;
                result.output = format!("{e:#}");
                result
            }
        }
    }
}

fn run_job(executors: &ExecutorRegistry, spool: &Spool, job: CheckJob) -> Result<()> {
    let outcome = executors.execute(&job.command_line, job.timeout)?;
    let result = job.into_result(outcome);
    let path = spool.commit(&result, Utc::now())?;
    debug!(
        "Committed result for {} to {}",
        result.target_name(),
        path.display()
    );
    Ok(())
}
