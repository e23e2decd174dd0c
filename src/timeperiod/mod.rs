//! Time period definitions and evaluation
//!
//! A time period is a weekly schedule of time ranges, refined by calendar
//! exceptions (which replace the weekly hours on the days they cover) and
//! reduced by excluded periods.

pub mod calendar;
pub mod daterange;
mod evaluator;
pub mod parse;


pub use calendar::Calendar;
pub use daterange::{DateRange, DateSpec, TimeRange};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::HashMap;

use crate::error::VigilError;
use crate::models::TimePeriodId;

#[derive(Debug, Clone, Default)]
pub struct TimePeriod {
    pub name: String,
    pub alias: String,
    /// Ranges per weekday, indexed from Sunday
    pub days: [Vec<TimeRange>; 7],
    /// Kept sorted by evaluation priority
    exceptions: Vec<DateRange>,
    pub exclusions: Vec<TimePeriodId>,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Every day, all day
    pub fn always(name: impl Into<String>) -> Self {
        let mut period = Self::new(name);
        for day in period.days.iter_mut() {
            day.push(TimeRange::all_day());
        }
        period
    }

    pub fn with_day(mut self, weekday: Weekday, ranges: Vec<TimeRange>) -> Self {
        self.set_day(weekday, ranges);
        self
    }

    pub fn set_day(&mut self, weekday: Weekday, ranges: Vec<TimeRange>) {
        self.days[weekday.num_days_from_sunday() as usize] = ranges;
    }

    pub fn add_exception(&mut self, range: DateRange) {
        let priority = range.spec.priority();
        let at = self
            .exceptions
            .partition_point(|existing| existing.spec.priority() <= priority);
        self.exceptions.insert(at, range);
    }

    pub fn exceptions(&self) -> &[DateRange] {
        &self.exceptions
    }

    /// Ranges in force on `date`: those of the first matching exception, or
    /// the weekly schedule.
    pub fn ranges_for(&self, date: NaiveDate) -> &[TimeRange] {
        self.exceptions
            .iter()
            .find(|exception| exception.matches(date))
            .map(|exception| exception.times.as_slice())
            .unwrap_or(&self.days[date.weekday().num_days_from_sunday() as usize])
    }

    /// Lower bound for the first day at or after `from` with open hours.
    /// `None` when no weekday and no exception can ever open one.
    pub fn next_active_date(&self, from: NaiveDate) -> Option<NaiveDate> {
        let weekly = (0..7u64)
            .filter_map(|offset| from.checked_add_days(Days::new(offset)))
            .find(|date| {
                self.days[date.weekday().num_days_from_sunday() as usize]
                    .iter()
                    .any(|range| !range.is_day_exclusion() && range.end > range.start)
            });
        let exceptions = self
            .exceptions
            .iter()
            .filter(|exception| exception.opens_hours())
            .filter_map(|exception| exception.first_match_from(from));
        weekly.into_iter().chain(exceptions).min()
    }
}

/// Arena of time periods, addressed by `TimePeriodId`
#[derive(Debug, Clone, Default)]
pub struct TimePeriods {
    periods: Vec<TimePeriod>,
    by_name: HashMap<String, TimePeriodId>,
    calendar: Calendar,
}

impl TimePeriods {
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            ..Default::default()
        }
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn add(&mut self, period: TimePeriod) -> Result<TimePeriodId, VigilError> {
        if self.by_name.contains_key(&period.name) {
            return Err(VigilError::DuplicateName(period.name));
        }
        let id = TimePeriodId(self.periods.len());
        self.by_name.insert(period.name.clone(), id);
        self.periods.push(period);
        Ok(id)
    }

    pub fn add_exclusion(
        &mut self,
        period: TimePeriodId,
        excluded: TimePeriodId,
    ) -> Result<(), VigilError> {
        if self.get(excluded).is_none() {
            return Err(VigilError::UnknownTimePeriod(excluded.to_string()));
        }
        let target = self
            .periods
            .get_mut(period.index())
            .ok_or_else(|| VigilError::UnknownTimePeriod(period.to_string()))?;
        if !target.exclusions.contains(&excluded) {
            target.exclusions.push(excluded);
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<TimePeriodId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TimePeriodId) -> Option<&TimePeriod> {
        self.periods.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimePeriodId, &TimePeriod)> {
        self.periods
            .iter()
            .enumerate()
            .map(|(index, period)| (TimePeriodId(index), period))
    }
}
