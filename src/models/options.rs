//! One-shot check option flags

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Bitset of options attached to a scheduled check or a check result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CheckOptions(u32);

impl CheckOptions {
    pub const NONE: CheckOptions = CheckOptions(0);
    /// Run even if checks are disabled or outside the check period
    pub const FORCE_EXECUTION: CheckOptions = CheckOptions(1);
    /// Triggered by the freshness sweep
    pub const FRESHNESS_CHECK: CheckOptions = CheckOptions(2);
    /// Triggered by the orphan sweep
    pub const ORPHAN_CHECK: CheckOptions = CheckOptions(4);
    /// On-demand check requested to refresh a dependency or route
    pub const DEPENDENCY_CHECK: CheckOptions = CheckOptions(8);

    pub fn from_bits(bits: u32) -> Self {
        CheckOptions(bits & 0x0f)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: CheckOptions) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_forced(self) -> bool {
        self.contains(CheckOptions::FORCE_EXECUTION)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CheckOptions {
    type Output = CheckOptions;

    fn bitor(self, rhs: CheckOptions) -> CheckOptions {
        CheckOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for CheckOptions {
    fn bitor_assign(&mut self, rhs: CheckOptions) {
        self.0 |= rhs.0;
    }
}
