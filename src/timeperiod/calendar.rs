//! Mapping between instants and civil days

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Clock that time period ranges are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calendar {
    /// The system's local time zone
    #[default]
    Local,
    Utc,
}

impl Calendar {
    /// Civil date `t` falls on
    pub fn local_date(self, t: DateTime<Utc>) -> NaiveDate {
        match self {
            Calendar::Local => t.with_timezone(&chrono::Local).date_naive(),
            Calendar::Utc => t.date_naive(),
        }
    }

    /// First instant of `date`
    pub fn midnight(self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self {
            Calendar::Utc => Utc.from_utc_datetime(&naive),
            Calendar::Local => {
                // Midnight may not exist on a DST transition day
                chrono::Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .or_else(|| {
                        chrono::Local
                            .from_local_datetime(&(naive + Duration::hours(1)))
                            .earliest()
                    })
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
            }
        }
    }

    /// Date of `t`, the midnight starting it, and the seconds elapsed since
    pub fn split(self, t: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>, i64) {
        let date = self.local_date(t);
        let midnight = self.midnight(date);
        (date, midnight, (t - midnight).num_seconds())
    }

    /// Midnight of the day after the one `t` falls on, always later than `t`
    pub fn next_midnight(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = self.local_date(t);
        let next = date
            .succ_opt()
            .map(|d| self.midnight(d))
            .unwrap_or(t + Duration::days(1));
        if next > t {
            next
        } else {
            t + Duration::days(1)
        }
    }
}
