//! Weekly time ranges and calendar exceptions

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Seconds in a civil day; the largest allowed range end
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Weekday/month offsets beyond this are clamped
const MAX_WEEKDAY_OFFSET: i32 = 5;

/// Half-open span `[start, end)` of seconds since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn all_day() -> Self {
        Self::new(0, SECONDS_PER_DAY)
    }

    /// `00:00-00:00` carves a whole day out of a repeating exception
    pub fn is_day_exclusion(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    pub fn contains(&self, secs: i64) -> bool {
        !self.is_day_exclusion() && i64::from(self.start) <= secs && secs < i64::from(self.end)
    }
}

/// Which days a calendar exception covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    /// Fixed dates; `end: None` repeats forever (only with a skip interval)
    Calendar {
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
    /// `(month, day)` pairs recurring every year; negative days count from month end
    MonthDate { start: (u32, i32), end: (u32, i32) },
    /// Days of every month
    MonthDay { start: i32, end: i32 },
    /// `(weekday, offset, month)`: e.g. the last Thursday of November
    MonthWeekDay {
        start: (Weekday, i32, u32),
        end: (Weekday, i32, u32),
    },
    /// `(weekday, offset)` within every month
    WeekDay {
        start: (Weekday, i32),
        end: (Weekday, i32),
    },
}

impl DateSpec {
    /// Evaluation order; lower wins when several exceptions match a day
    pub fn priority(&self) -> u8 {
        match self {
            DateSpec::Calendar { .. } => 0,
            DateSpec::MonthDate { .. } => 1,
            DateSpec::MonthDay { .. } => 2,
            DateSpec::MonthWeekDay { .. } => 3,
            DateSpec::WeekDay { .. } => 4,
        }
    }
}

/// A calendar exception: the days it covers and the hours valid on them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub spec: DateSpec,
    /// Repeat every N days from the range start (0 or 1 means every day)
    pub skip_interval: u32,
    pub times: Vec<TimeRange>,
}

type Window = (NaiveDate, Option<NaiveDate>);

impl DateRange {
    pub fn new(spec: DateSpec, times: Vec<TimeRange>) -> Self {
        Self {
            spec,
            skip_interval: 0,
            times,
        }
    }

    pub fn with_skip(mut self, skip_interval: u32) -> Self {
        self.skip_interval = skip_interval;
        self
    }

    /// Whether `date` is one of the days this exception covers
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.windows(date)
            .into_iter()
            .flatten()
            .any(|window| self.window_contains(window, date))
    }

    /// Earliest day at or after `date` this exception could cover. Exact
    /// for fixed dates; recurring kinds answer `date` itself.
    pub fn first_match_from(&self, date: NaiveDate) -> Option<NaiveDate> {
        let DateSpec::Calendar { start, end } = self.spec else {
            return Some(date);
        };
        let mut day = date.max(start);
        if self.skip_interval > 1 {
            let skip = i64::from(self.skip_interval);
            let behind = (day - start).num_days() % skip;
            if behind > 0 {
                day += Duration::days(skip - behind);
            }
        }
        match end {
            Some(end) if day > end => None,
            _ => Some(day),
        }
    }

    /// Whether any hours remain open on the days this exception covers
    pub fn opens_hours(&self) -> bool {
        self.times.iter().any(|range| !range.is_day_exclusion() && range.end > range.start)
    }

    fn window_contains(&self, (start, end): Window, date: NaiveDate) -> bool {
        if date < start {
            return false;
        }
        if let Some(end) = end {
            if date > end {
                return false;
            }
        }
        if self.skip_interval > 1 {
            (date - start).num_days() % i64::from(self.skip_interval) == 0
        } else {
            true
        }
    }

    /// Occurrences of the range that could contain `date`: the one anchored
    /// in the current year/month and the previous one, which may wrap into it.
    fn windows(&self, date: NaiveDate) -> [Option<Window>; 2] {
        let year = date.year();
        let month = date.month();
        match self.spec {
            DateSpec::Calendar { start, end } => [Some((start, end)), None],
            DateSpec::MonthDate { start, end } => {
                let start_at = |y: i32| day_of_month(y, start.0, start.1);
                let end_at = |y: i32| end_day_of_month(y, end.0, end.1);
                [
                    yearly_window(year - 1, start_at, end_at),
                    yearly_window(year, start_at, end_at),
                ]
            }
            DateSpec::MonthDay { start, end } => {
                let start_at = |y: i32, m: u32| day_of_month(y, m, start);
                let end_at = |y: i32, m: u32| end_day_of_month(y, m, end);
                let (prev_year, prev_month) = previous_month(year, month);
                [
                    monthly_window(prev_year, prev_month, start_at, end_at),
                    monthly_window(year, month, start_at, end_at),
                ]
            }
            DateSpec::MonthWeekDay { start, end } => {
                let start_at = |y: i32| weekday_of_month(y, start.2, start.0, start.1);
                let end_at = |y: i32| end_weekday_of_month(y, end.2, end.0, end.1);
                [
                    yearly_window(year - 1, start_at, end_at),
                    yearly_window(year, start_at, end_at),
                ]
            }
            DateSpec::WeekDay { start, end } => {
                let start_at = |y: i32, m: u32| weekday_of_month(y, m, start.0, start.1);
                let end_at = |y: i32, m: u32| end_weekday_of_month(y, m, end.0, end.1);
                let (prev_year, prev_month) = previous_month(year, month);
                [
                    monthly_window(prev_year, prev_month, start_at, end_at),
                    monthly_window(year, month, start_at, end_at),
                ]
            }
        }
    }
}

fn yearly_window(
    year: i32,
    start_at: impl Fn(i32) -> Option<NaiveDate>,
    end_at: impl Fn(i32) -> Option<NaiveDate>,
) -> Option<Window> {
    let start = start_at(year)?;
    let mut end = end_at(year)?;
    if end < start {
        end = end_at(year + 1)?;
    }
    Some((start, Some(end)))
}

fn monthly_window(
    year: i32,
    month: u32,
    start_at: impl Fn(i32, u32) -> Option<NaiveDate>,
    end_at: impl Fn(i32, u32) -> Option<NaiveDate>,
) -> Option<Window> {
    let start = start_at(year, month)?;
    let mut end = end_at(year, month)?;
    if end < start {
        let (next_year, next_month) = next_month(year, month);
        end = end_at(next_year, next_month)?;
    }
    Some((start, Some(end)))
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = next_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// The `mday`-th day of a month; negative values count back from the last
/// day (-1 is the last day). Days that would roll into another month are
/// invalid.
pub fn day_of_month(year: i32, month: u32, mday: i32) -> Option<NaiveDate> {
    if mday > 0 {
        return NaiveDate::from_ymd_opt(year, month, u32::try_from(mday).ok()?);
    }
    if mday == 0 {
        return None;
    }
    let last = last_day_of_month(year, month)?;
    let day = last.day() as i32 + mday.max(-31) + 1;
    if day < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day as u32)
}

/// The `offset`-th `weekday` of a month (clamped to ±5); zero and negative
/// offsets count back from the last instance.
pub fn weekday_of_month(year: i32, month: u32, weekday: Weekday, offset: i32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let candidate = if offset > 0 {
        let shift = (7 + weekday.num_days_from_sunday() as i64
            - first.weekday().num_days_from_sunday() as i64)
            % 7;
        first + Duration::days(shift + (i64::from(offset.min(MAX_WEEKDAY_OFFSET)) - 1) * 7)
    } else {
        let last = last_day_of_month(year, month)?;
        let shift = (7 + last.weekday().num_days_from_sunday() as i64
            - weekday.num_days_from_sunday() as i64)
            % 7;
        let offset = if offset == 0 { -1 } else { offset };
        last - Duration::days(shift) + Duration::days((i64::from(offset.max(-MAX_WEEKDAY_OFFSET)) + 1) * 7)
    };
    if candidate.month() == month && candidate.year() == year {
        Some(candidate)
    } else {
        None
    }
}

/// Range ends that fall outside the month stretch to its last day when
/// counted forward.
fn end_day_of_month(year: i32, month: u32, mday: i32) -> Option<NaiveDate> {
    day_of_month(year, month, mday).or_else(|| {
        if mday >= 0 {
            last_day_of_month(year, month)
        } else {
            None
        }
    })
}

fn end_weekday_of_month(year: i32, month: u32, weekday: Weekday, offset: i32) -> Option<NaiveDate> {
    weekday_of_month(year, month, weekday, offset).or_else(|| {
        if offset >= 0 {
            last_day_of_month(year, month)
        } else {
            None
        }
    })
}
