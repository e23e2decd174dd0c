//! Check result store: on-disk spool plus the in-memory completion queue

pub mod format;
pub mod spool;


pub use spool::Spool;

use std::collections::VecDeque;

use crate::models::CheckResult;

/// Results waiting to be processed, ordered by ascending finish time.
/// Results finishing at the same instant keep their insertion order.
#[derive(Debug, Default)]
pub struct CheckResultQueue {
    results: VecDeque<CheckResult>,
}

impl CheckResultQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: CheckResult) {
        let at = self
            .results
            .partition_point(|queued| queued.finish_time <= result.finish_time);
        self.results.insert(at, result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = CheckResult>) {
        for result in results {
            self.push(result);
        }
    }

    /// Earliest-finishing result
    pub fn pop(&mut self) -> Option<CheckResult> {
        self.results.pop_front()
    }

    /// Remove and return everything in completion order
    pub fn drain(&mut self) -> Vec<CheckResult> {
        self.results.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
