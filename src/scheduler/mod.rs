//! Due-time ordered queue of pending checks
//!
//! Each host or service has at most one pending check. Which request wins
//! when a second one arrives is decided by [`policy`]; the queue itself only
//! stores and orders.

pub mod policy;


pub use policy::should_replace;

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::models::{CheckOptions, CheckTarget};

/// A pending check of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledCheck {
    pub target: CheckTarget,
    pub due: DateTime<Utc>,
    pub options: CheckOptions,
}

type QueueKey = (DateTime<Utc>, u64);

/// Checks ordered by due time, ties broken by insertion order
#[derive(Debug, Default)]
pub struct EventQueue {
    order: BTreeMap<QueueKey, ScheduledCheck>,
    by_target: HashMap<CheckTarget, QueueKey>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending check of `target`, if any
    pub fn get(&self, target: CheckTarget) -> Option<&ScheduledCheck> {
        self.by_target.get(&target).and_then(|key| self.order.get(key))
    }

    /// Queue a check, dropping any check already pending for the same target
    pub fn insert(&mut self, target: CheckTarget, due: DateTime<Utc>, options: CheckOptions) {
        self.remove(target);
        let key = (due, self.next_seq);
        self.next_seq += 1;
        self.order.insert(
            key,
            ScheduledCheck {
                target,
                due,
                options,
            },
        );
        self.by_target.insert(target, key);
    }

    pub fn remove(&mut self, target: CheckTarget) -> Option<ScheduledCheck> {
        let key = self.by_target.remove(&target)?;
        self.order.remove(&key)
    }

    /// Remove and return the earliest check due at or before `now`
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ScheduledCheck> {
        let (&key, _) = self.order.first_key_value()?;
        if key.0 > now {
            return None;
        }
        let check = self.order.remove(&key)?;
        self.by_target.remove(&check.target);
        Some(check)
    }

    /// Due time of the earliest pending check
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.order.first_key_value().map(|(key, _)| key.0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Pending checks in execution order
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledCheck> {
        self.order.values()
    }
}
