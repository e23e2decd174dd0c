//! The main loop
//!
//! One thread owns the engine. Each pass drains worker completions,
//! launches due checks, reaps the spool, applies results in finish-time
//! order and runs whichever periodic sweep is due. Between passes the loop
//! sleeps on the completion channel until the next event or a wake-up.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use tracing::{debug, error, info};

use super::{Engine, StatusSnapshot};

/// Upper bound on one sleep, so a raised shutdown flag is noticed promptly
const MAX_SLEEP: std::time::Duration = std::time::Duration::from_secs(1);

/// When each periodic task is next due
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Timers {
    pub(crate) next_reap: DateTime<Utc>,
    pub(crate) next_orphan_check: DateTime<Utc>,
    pub(crate) next_service_freshness: DateTime<Utc>,
    pub(crate) next_host_freshness: DateTime<Utc>,
    pub(crate) next_status: DateTime<Utc>,
    /// A worker committed a result since the last reap
    pub(crate) reap_requested: bool,
}

impl Timers {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            next_reap: now,
            next_orphan_check: now,
            next_service_freshness: now,
            next_host_freshness: now,
            next_status: now,
            reap_requested: false,
        }
    }

    fn earliest(&self) -> DateTime<Utc> {
        [
            self.next_reap,
            self.next_orphan_check,
            self.next_service_freshness,
            self.next_host_freshness,
            self.next_status,
        ]
        .into_iter()
        .min()
        .unwrap_or(self.next_reap)
    }
}

fn every(secs: u64) -> Duration {
    Duration::seconds(secs.max(1) as i64)
}

impl Engine {
    /// Move committed results from the spool into the result queue
    pub fn reap_results(&mut self, now: DateTime<Utc>) -> usize {
        let reaped = self
            .dispatcher
            .spool()
            .reap(self.config.max_reaper_time(), &self.shutdown, now);
        match reaped {
            Ok(results) => {
                let count = results.len();
                if count > 0 {
                    debug!("Reaped {} check results", count);
                }
                self.results.extend(results);
                count
            }
            Err(e) => {
                error!("Failed to reap check results: {:#}", e);
                0
            }
        }
    }

    /// Publish the status snapshot if a status file is configured
    pub fn write_status(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.stats.generate(now);
        if let Some(writer) = &self.status_writer {
            writer.write(&StatusSnapshot::capture(self, now))?;
        }
        self.status_dirty = false;
        Ok(())
    }

    /// One pass of the main loop at `now`. Returns the number of results
    /// applied.
    pub fn run_once(&mut self, now: DateTime<Utc>) -> usize {
        while let Ok(completion) = self.completions.try_recv() {
            self.handle_completion(completion, now);
        }

        self.run_due_checks(now);

        if self.timers.reap_requested || now >= self.timers.next_reap {
            self.reap_results(now);
            self.timers.reap_requested = false;
            self.timers.next_reap = now + every(self.config.check_result_reaper_frequency);
        }
        let processed = self.process_results(now);

        if now >= self.timers.next_orphan_check {
            self.check_for_orphaned_services(now);
            self.check_for_orphaned_hosts(now);
            self.timers.next_orphan_check = now + every(self.config.orphan_check_interval);
        }
        if now >= self.timers.next_service_freshness {
            self.check_service_result_freshness(now);
            self.timers.next_service_freshness =
                now + every(self.config.service_freshness_check_interval);
        }
        if now >= self.timers.next_host_freshness {
            self.check_host_result_freshness(now);
            self.timers.next_host_freshness = now + every(self.config.host_freshness_check_interval);
        }
        if now >= self.timers.next_status {
            if self.status_dirty {
                if let Err(e) = self.write_status(now) {
                    error!("Failed to write status file: {:#}", e);
                }
            }
            self.timers.next_status = now + every(self.config.status_update_interval);
        }
        processed
    }

    /// How long the loop may sleep before something is due
    fn idle_time(&self, now: DateTime<Utc>) -> std::time::Duration {
        let next = match self.events.next_due() {
            Some(due) => due.min(self.timers.earliest()),
            None => self.timers.earliest(),
        };
        (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
            .min(MAX_SLEEP)
    }

    /// Run until the shutdown flag is raised
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Starting check engine with {} hosts and {} services",
            self.objects.hosts.len(),
            self.objects.services.len()
        );
        self.schedule_initial_checks(Utc::now());

        while !self.shutdown.load(Ordering::SeqCst) {
            self.run_once(Utc::now());
            match self.completions.recv_timeout(self.idle_time(Utc::now())) {
                Ok(completion) => self.handle_completion(completion, Utc::now()),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }

        let now = Utc::now();
        self.last_program_stop = Some(now);
        self.write_status(now)?;
        info!(
            "Check engine stopped with {} service and {} host checks still running",
            self.running_service_checks, self.running_host_checks
        );
        Ok(())
    }
}
