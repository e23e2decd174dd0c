//! Check states and state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service state as reported by a plugin exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Map a plugin return code following the 0..=3 convention
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ServiceState::Ok),
            1 => Some(ServiceState::Warning),
            2 => Some(ServiceState::Critical),
            3 => Some(ServiceState::Unknown),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ServiceState::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host state after reachability has been resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    #[default]
    Up,
    Down,
    Unreachable,
}

impl HostState {
    /// Interpret the return code of a passive host result, which already
    /// carries the final state (0 up, 1 down, 2 unreachable).
    pub fn from_passive_code(code: i32) -> Self {
        match code {
            0 => HostState::Up,
            2 => HostState::Unreachable,
            _ => HostState::Down,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            HostState::Up => 0,
            HostState::Down => 1,
            HostState::Unreachable => 2,
        }
    }

    pub fn is_up(self) -> bool {
        self == HostState::Up
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostState::Up => "UP",
            HostState::Down => "DOWN",
            HostState::Unreachable => "UNREACHABLE",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    Soft,
    #[default]
    Hard,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            StateType::Soft => "SOFT",
            StateType::Hard => "HARD",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a result came from an engine-launched check or was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    #[default]
    Active,
    Passive,
}

impl CheckType {
    /// Numeric form used in check result files
    pub fn code(self) -> i32 {
        match self {
            CheckType::Active => 0,
            CheckType::Passive => 1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            CheckType::Passive
        } else {
            CheckType::Active
        }
    }
}

/// Acknowledgement attached to a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcknowledgementType {
    #[default]
    None,
    /// Cleared on any state change
    Normal,
    /// Survives problem-to-problem changes, cleared on recovery
    Sticky,
}
