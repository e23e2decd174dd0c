//! Execution and notification dependencies between hosts and services

pub mod cycle;
mod resolver;


pub use cycle::validate_graph;
pub use resolver::{DependencyResolver, MAX_DEPENDENCY_DEPTH};

use serde::{Deserialize, Serialize};

use crate::models::{HostId, ServiceId, TimePeriodId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Blocks active checks of the dependent
    Execution,
    /// Suppresses notifications of the dependent
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyResult {
    Ok,
    Failed,
}

impl DependencyResult {
    pub fn is_ok(self) -> bool {
        self == DependencyResult::Ok
    }
}

/// Master states that make a dependency fail, as a bitset over state codes
/// plus a `pending` bit for masters that have never been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailureOptions(u8);

impl FailureOptions {
    const PENDING: u8 = 1 << 7;

    pub fn none() -> Self {
        FailureOptions(0)
    }

    pub fn on_code(mut self, code: i32) -> Self {
        if (0..7).contains(&code) {
            self.0 |= 1 << code;
        }
        self
    }

    pub fn on_pending(mut self) -> Self {
        self.0 |= Self::PENDING;
        self
    }

    pub fn fails_on(self, state: MasterState) -> bool {
        match state {
            MasterState::Pending => self.0 & Self::PENDING != 0,
            MasterState::Code(code) => (0..7).contains(&code) && self.0 & (1 << code) != 0,
        }
    }

    /// Parse letter lists: `o,w,u,c,p` for services, `u,d,r,p` for hosts,
    /// `n` for none. Unknown letters are rejected.
    pub fn parse(input: &str, for_hosts: bool) -> Option<Self> {
        let mut options = FailureOptions::none();
        for letter in input.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            options = match (letter, for_hosts) {
                ("n", _) => options,
                ("p", _) => options.on_pending(),
                ("o", false) | ("u", true) => options.on_code(0),
                ("w", false) | ("d", true) => options.on_code(1),
                ("c", false) | ("r", true) => options.on_code(2),
                ("u", false) => options.on_code(3),
                _ => return None,
            };
        }
        Some(options)
    }
}

/// Effective state of a master as seen by a dependency test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    Pending,
    Code(i32),
}

/// Edge from a dependent entity to the master it relies on
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency<Id> {
    pub dependent: Id,
    pub master: Id,
    pub kind: DependencyKind,
    pub failure_options: FailureOptions,
    /// Also require the master's own dependencies of the same kind to pass
    pub inherits_parent: bool,
    /// Outside this period the dependency fails
    pub period: Option<TimePeriodId>,
}

impl<Id> Dependency<Id> {
    pub fn new(dependent: Id, master: Id, kind: DependencyKind) -> Self {
        Self {
            dependent,
            master,
            kind,
            failure_options: FailureOptions::none(),
            inherits_parent: false,
            period: None,
        }
    }
}

pub type HostDependency = Dependency<HostId>;
pub type ServiceDependency = Dependency<ServiceId>;
