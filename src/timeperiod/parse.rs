//! Parser for time range lists and calendar exception lines
//!
//! Accepted exception forms, each followed by a time range list:
//!
//! ```text
//! 2026-12-25                      calendar date
//! 2026-12-20 - 2027-01-03 / 2     calendar range, every other day
//! 2026-01-01 / 3                  every third day from a date, forever
//! december 25 - january 2         month dates, every year
//! february -1                     last day of february
//! day 1 - 15                      days of every month
//! day -1                          last day of every month
//! thursday -1 november            last thursday of november
//! monday 3                        third monday of every month
//! monday 1 - thursday 4           weekday offsets within every month
//! ```

use chrono::{Month, NaiveDate, Weekday};

use super::daterange::{DateRange, DateSpec, TimeRange, SECONDS_PER_DAY};
use crate::error::VigilError;

/// Parse `09:00-12:00,13:00-17:00`; `24:00` is a valid end
pub fn parse_time_ranges(input: &str) -> Result<Vec<TimeRange>, VigilError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_time_range)
        .collect()
}

fn parse_time_range(input: &str) -> Result<TimeRange, VigilError> {
    let invalid = || VigilError::InvalidTimeRange(input.to_string());
    let (start, end) = input.split_once('-').ok_or_else(invalid)?;
    let start = parse_clock(start.trim()).ok_or_else(invalid)?;
    let end = parse_clock(end.trim()).ok_or_else(invalid)?;
    if end < start {
        return Err(invalid());
    }
    Ok(TimeRange::new(start, end))
}

fn parse_clock(input: &str) -> Option<u32> {
    let (hours, minutes) = input.split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    let secs = hours * 3600 + minutes * 60;
    (secs <= SECONDS_PER_DAY).then_some(secs)
}

/// One side of a date range before both sides are reconciled
#[derive(Debug, Clone, Copy, PartialEq)]
enum DateSide {
    Calendar(NaiveDate),
    MonthDate(u32, i32),
    MonthDay(i32),
    MonthWeekDay(Weekday, i32, u32),
    WeekDay(Weekday, i32),
    /// A bare number on the end side: same unit as the start side
    Bare(i32),
}

/// Parse a full exception line: date part followed by its time ranges
pub fn parse_date_range(input: &str) -> Result<DateRange, VigilError> {
    let invalid = || VigilError::InvalidDateRange(input.to_string());
    let tokens: Vec<&str> = input.split_whitespace().collect();
    // Dates never contain ':', so the first clock token starts the time list
    let split = tokens
        .iter()
        .position(|token| token.contains(':'))
        .ok_or_else(invalid)?;
    if split == 0 {
        return Err(invalid());
    }
    let dates = tokens[..split].join(" ");
    let times = parse_time_ranges(&tokens[split..].join(""))?;
    if times.is_empty() {
        return Err(invalid());
    }

    let (dates, skip_interval) = match dates.split_once('/') {
        Some((dates, skip)) => {
            let skip: u32 = skip.trim().parse().map_err(|_| invalid())?;
            if skip == 0 {
                return Err(invalid());
            }
            (dates.trim(), skip)
        }
        None => (dates.trim(), 0),
    };

    let (start, end) = match dates.split_once(" - ") {
        Some((start, end)) => {
            let start = parse_side(start.trim()).ok_or_else(invalid)?;
            let end = parse_side(end.trim()).ok_or_else(invalid)?;
            (start, Some(end))
        }
        None => (parse_side(dates).ok_or_else(invalid)?, None),
    };

    let spec = reconcile(start, end, skip_interval).ok_or_else(invalid)?;
    Ok(DateRange::new(spec, times).with_skip(skip_interval))
}

fn parse_side(input: &str) -> Option<DateSide> {
    let tokens: Vec<&str> = input.split(' ').collect();
    match tokens.as_slice() {
        [single] => {
            if let Ok(date) = NaiveDate::parse_from_str(single, "%Y-%m-%d") {
                return Some(DateSide::Calendar(date));
            }
            single.parse().ok().map(DateSide::Bare)
        }
        [word, number] => {
            let number: i32 = number.parse().ok()?;
            if word.eq_ignore_ascii_case("day") {
                return Some(DateSide::MonthDay(number));
            }
            if let Ok(month) = word.parse::<Month>() {
                return Some(DateSide::MonthDate(month.number_from_month(), number));
            }
            word.parse::<Weekday>()
                .ok()
                .map(|weekday| DateSide::WeekDay(weekday, number))
        }
        [weekday, offset, month] => {
            let weekday = weekday.parse::<Weekday>().ok()?;
            let offset: i32 = offset.parse().ok()?;
            let month = month.parse::<Month>().ok()?;
            Some(DateSide::MonthWeekDay(
                weekday,
                offset,
                month.number_from_month(),
            ))
        }
        _ => None,
    }
}

fn reconcile(start: DateSide, end: Option<DateSide>, skip_interval: u32) -> Option<DateSpec> {
    let spec = match (start, end.unwrap_or(start)) {
        (DateSide::Calendar(start_date), DateSide::Calendar(end_date)) => DateSpec::Calendar {
            start: start_date,
            // A lone date with a skip interval repeats with no end
            end: if end.is_none() && skip_interval > 1 {
                None
            } else {
                Some(end_date)
            },
        },
        (DateSide::MonthDate(sm, sd), DateSide::MonthDate(em, ed)) => DateSpec::MonthDate {
            start: (sm, sd),
            end: (em, ed),
        },
        (DateSide::MonthDate(sm, sd), DateSide::Bare(ed)) => DateSpec::MonthDate {
            start: (sm, sd),
            end: (sm, ed),
        },
        (DateSide::MonthDay(sd), DateSide::MonthDay(ed) | DateSide::Bare(ed)) => {
            DateSpec::MonthDay { start: sd, end: ed }
        }
        (DateSide::MonthWeekDay(sw, so, sm), DateSide::MonthWeekDay(ew, eo, em)) => {
            DateSpec::MonthWeekDay {
                start: (sw, so, sm),
                end: (ew, eo, em),
            }
        }
        (DateSide::WeekDay(sw, so), DateSide::WeekDay(ew, eo)) => DateSpec::WeekDay {
            start: (sw, so),
            end: (ew, eo),
        },
        (DateSide::WeekDay(sw, so), DateSide::Bare(eo)) => DateSpec::WeekDay {
            start: (sw, so),
            end: (sw, eo),
        },
        _ => return None,
    };
    if let DateSpec::Calendar {
        start,
        end: Some(end),
    } = spec
    {
        if end < start {
            return None;
        }
    }
    Some(spec)
}
