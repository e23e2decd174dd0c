//! Bounded ring buffer of recent state codes used for flap detection

/// Number of state samples kept per entity
pub const MAX_STATE_HISTORY_ENTRIES: usize = 21;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateHistory {
    entries: [i32; MAX_STATE_HISTORY_ENTRIES],
    /// Slot the next sample is written to (also the oldest sample)
    index: usize,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self {
            entries: [0; MAX_STATE_HISTORY_ENTRIES],
            index: 0,
        }
    }
}

impl StateHistory {
    pub fn record(&mut self, state_code: i32) {
        self.entries[self.index] = state_code;
        self.index = (self.index + 1) % MAX_STATE_HISTORY_ENTRIES;
    }

    /// Samples from oldest to newest
    pub fn oldest_first(&self) -> impl Iterator<Item = i32> + '_ {
        (0..MAX_STATE_HISTORY_ENTRIES)
            .map(move |offset| self.entries[(self.index + offset) % MAX_STATE_HISTORY_ENTRIES])
    }
}
