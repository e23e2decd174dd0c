//! The engine context
//!
//! [`Engine`] owns everything the check pipeline touches: configuration,
//! the object arenas, the event and result queues, the dispatcher, check
//! statistics and the counters that would otherwise be process globals.
//! Its behaviour is spread over several modules, each adding an `impl
//! Engine` block: scheduling (`scheduler`), check launching
//! (`engine::dispatch`), result handling (`processor`), sweeps (`monitor`)
//! and the main loop (`engine::run`).

mod dispatch;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod hooks;
mod notify;
mod run;
pub mod status;


pub use dispatch::CheckRefused;
pub use hooks::{
    BrokerEvent, EngineHooks, HookCall, HookDecision, LoggingHooks, NotificationKind,
    RecordingHooks,
};
pub use status::{StatusFileWriter, StatusSnapshot};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::executor::{Completion, Dispatcher, ExecutorRegistry};
use crate::models::CheckResult;
use crate::monitor::CheckStats;
use crate::objects::ObjectStore;
use crate::queue::{CheckResultQueue, Spool};
use crate::scheduler::EventQueue;
use crate::timeperiod::TimePeriods;

use run::Timers;

/// Fractional seconds as a duration, at millisecond resolution
pub(crate) fn seconds(secs: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
}

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) objects: ObjectStore,
    pub(crate) periods: TimePeriods,
    pub(crate) events: EventQueue,
    pub(crate) results: CheckResultQueue,
    pub(crate) stats: CheckStats,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) completions: Receiver<Completion>,
    pub(crate) hooks: Box<dyn EngineHooks>,
    pub(crate) running_service_checks: usize,
    pub(crate) running_host_checks: usize,
    pub(crate) next_event_id: u64,
    pub(crate) next_problem_id: u64,
    pub(crate) program_start: DateTime<Utc>,
    pub(crate) last_program_stop: Option<DateTime<Utc>>,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) timers: Timers,
    /// Set whenever an entity's status changed since the last snapshot
    pub(crate) status_dirty: bool,
    pub(crate) status_writer: Option<StatusFileWriter>,
}

impl Engine {
    /// Build an engine over resolved objects. Opens (and creates) the
    /// check result spool.
    pub fn new(config: EngineConfig, objects: ObjectStore, periods: TimePeriods) -> Result<Self> {
        let spool = Spool::open(&config.check_result_path, config.max_check_result_file_age)
            .context("Failed to open check result spool")?;
        let (dispatcher, completions) = Dispatcher::new(ExecutorRegistry::default(), spool);
        let now = Utc::now();
        let status_writer = config.status_file.clone().map(StatusFileWriter::new);

        Ok(Self {
            timers: Timers::new(now),
            config,
            objects,
            periods,
            events: EventQueue::new(),
            results: CheckResultQueue::new(),
            stats: CheckStats::new(now),
            dispatcher,
            completions,
            hooks: Box::new(LoggingHooks),
            running_service_checks: 0,
            running_host_checks: 0,
            next_event_id: 1,
            next_problem_id: 1,
            program_start: now,
            last_program_stop: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            status_dirty: false,
            status_writer,
        })
    }

    pub fn with_hooks(mut self, hooks: impl EngineHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Replace the executors used for active checks
    pub fn with_executors(mut self, executors: ExecutorRegistry) -> Self {
        let spool = self.dispatcher.spool().clone();
        let (dispatcher, completions) = Dispatcher::new(executors, spool);
        self.dispatcher = dispatcher;
        self.completions = completions;
        self
    }

    /// Override the program start (and previous stop) instants, which
    /// anchor freshness and statistics.
    pub fn set_program_times(&mut self, start: DateTime<Utc>, last_stop: Option<DateTime<Utc>>) {
        self.program_start = start;
        self.last_program_stop = last_stop;
        self.stats = CheckStats::new(start);
        self.timers = Timers::new(start);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn periods(&self) -> &TimePeriods {
        &self.periods
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn stats(&self) -> &CheckStats {
        &self.stats
    }

    pub fn spool(&self) -> &Spool {
        self.dispatcher.spool()
    }

    pub fn program_start(&self) -> DateTime<Utc> {
        self.program_start
    }

    pub fn running_service_checks(&self) -> usize {
        self.running_service_checks
    }

    pub fn running_host_checks(&self) -> usize {
        self.running_host_checks
    }

    /// Flag that stops [`Engine::run`] and aborts a reaper pass when raised
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Queue a result for processing, as if it had been reaped
    pub fn submit(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    /// Results waiting to be processed
    pub fn pending_results(&self) -> usize {
        self.results.len()
    }

    pub(crate) fn next_event_id(&mut self) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    pub(crate) fn next_problem_id(&mut self) -> u64 {
        let id = self.next_problem_id;
        self.next_problem_id += 1;
        id
    }

    /// Snapshot of the current state for status publishing
    pub fn snapshot(&self, now: DateTime<Utc>) -> StatusSnapshot<'_> {
        StatusSnapshot::capture(self, now)
    }
}
