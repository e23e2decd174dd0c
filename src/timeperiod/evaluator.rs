//! Membership tests and forward scans over time periods

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::{TimePeriod, TimePeriods};
use crate::models::TimePeriodId;

/// Upper bound on scan steps; days without open hours are skipped in one step
const MAX_SCAN_STEPS: usize = 1500;

impl TimePeriods {
    /// Whether `t` lies inside `period`. An absent period covers all time.
    pub fn is_time_in_period(&self, t: DateTime<Utc>, period: Option<TimePeriodId>) -> bool {
        match period {
            None => true,
            Some(id) => self.contains(t, id, &mut Vec::new()),
        }
    }

    /// Earliest instant at or after `preferred` (never before `now`) inside
    /// `period`. When no such instant is found within the scan horizon the
    /// clamped preferred time is returned unchanged; callers detect that
    /// case with `is_time_in_period`.
    pub fn next_valid_time(
        &self,
        preferred: DateTime<Utc>,
        period: Option<TimePeriodId>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let start = preferred.max(now);
        let Some(id) = period else {
            return start;
        };
        if self.is_time_in_period(start, period) {
            return start;
        }
        match self.scan_valid(start, id, &mut Vec::new()) {
            Some(found) => found,
            None => {
                debug!(
                    "No valid time found in period {} after {}",
                    self.name_of(id),
                    start
                );
                start
            }
        }
    }

    /// Earliest instant at or after `t` outside `period`
    pub fn next_invalid_time(&self, t: DateTime<Utc>, period: Option<TimePeriodId>) -> Option<DateTime<Utc>> {
        let id = period?;
        self.scan_invalid(t, id, &mut Vec::new())
    }

    fn name_of(&self, id: TimePeriodId) -> &str {
        self.get(id).map(|p| p.name.as_str()).unwrap_or("?")
    }

    /// `visiting` holds the periods whose exclusions are currently being
    /// evaluated; a period reached again through its own exclusion chain is
    /// tested without exclusions.
    fn contains(&self, t: DateTime<Utc>, id: TimePeriodId, visiting: &mut Vec<TimePeriodId>) -> bool {
        let Some(period) = self.get(id) else {
            return false;
        };
        if !visiting.contains(&id) {
            visiting.push(id);
            let excluded = period
                .exclusions
                .iter()
                .any(|&exclusion| self.contains(t, exclusion, visiting));
            visiting.pop();
            if excluded {
                return false;
            }
        }
        let (date, _, secs) = self.calendar().split(t);
        period.ranges_for(date).iter().any(|range| range.contains(secs))
    }

    /// Earliest slot at or after `t` in the ranges of the day `t` falls on
    fn earliest_in_day(&self, period: &TimePeriod, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let (date, midnight, secs) = self.calendar().split(t);
        period
            .ranges_for(date)
            .iter()
            .filter(|range| !range.is_day_exclusion() && i64::from(range.end) > secs)
            .map(|range| midnight + Duration::seconds(i64::from(range.start).max(secs)))
            .min()
    }

    fn scan_valid(
        &self,
        from: DateTime<Utc>,
        id: TimePeriodId,
        visiting: &mut Vec<TimePeriodId>,
    ) -> Option<DateTime<Utc>> {
        let period = self.get(id)?;
        let guarded = visiting.contains(&id);
        let mut t = from;

        for _ in 0..MAX_SCAN_STEPS {
            let Some(mut candidate) = self.earliest_in_day(period, t) else {
                // Jump over days that cannot open, however far away the next one is
                let tomorrow = self.calendar().next_midnight(t);
                let next_day = period.next_active_date(self.calendar().local_date(tomorrow))?;
                t = self.calendar().midnight(next_day).max(tomorrow);
                continue;
            };

            let mut moved = false;
            if !guarded {
                visiting.push(id);
                for &exclusion in &period.exclusions {
                    if !self.contains(candidate, exclusion, visiting) {
                        continue;
                    }
                    match self.scan_invalid(candidate, exclusion, visiting) {
                        Some(end) if end > candidate => {
                            candidate = end;
                            moved = true;
                        }
                        Some(_) => {}
                        // The exclusion never ends within reach
                        None => {
                            visiting.pop();
                            return None;
                        }
                    }
                }
                visiting.pop();
            }

            if !moved {
                return Some(candidate);
            }
            t = candidate;
        }
        None
    }

    fn scan_invalid(
        &self,
        from: DateTime<Utc>,
        id: TimePeriodId,
        visiting: &mut Vec<TimePeriodId>,
    ) -> Option<DateTime<Utc>> {
        let period = self.get(id)?;
        let mut t = from;

        for _ in 0..MAX_SCAN_STEPS {
            if !self.contains(t, id, visiting) {
                return Some(t);
            }

            let (date, midnight, secs) = self.calendar().split(t);
            let mut next = period
                .ranges_for(date)
                .iter()
                .filter(|range| range.contains(secs))
                .map(|range| midnight + Duration::seconds(i64::from(range.end)))
                .max()
                .unwrap_or(t + Duration::seconds(1));

            // An exclusion starting before the range ends cuts it short
            if !visiting.contains(&id) {
                visiting.push(id);
                for &exclusion in &period.exclusions {
                    if let Some(valid) = self.scan_valid(t, exclusion, visiting) {
                        if valid > t && valid < next {
                            next = valid;
                        }
                    }
                }
                visiting.pop();
            }

            t = if next > t { next } else { t + Duration::seconds(1) };
        }
        None
    }
}
