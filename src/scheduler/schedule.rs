use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// when a job fires, in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum Cadence {
    Daily { at: NaiveTime },
    Weekly { weekday: Weekday, at: NaiveTime },
    /// `day` is limited to 1..=28 so every month has it
    Monthly { day: u32, at: NaiveTime },
}

fn time(hour: u32, minute: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| LedgerError::Configuration {
        message: format!("invalid time of day {:02}:{:02}", hour, minute),
    })
}

impl Cadence {
    pub fn daily(hour: u32, minute: u32) -> Result<Self> {
        Ok(Cadence::Daily { at: time(hour, minute)? })
    }

    pub fn weekly(weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
        Ok(Cadence::Weekly { weekday, at: time(hour, minute)? })
    }

    pub fn monthly(day: u32, hour: u32, minute: u32) -> Result<Self> {
        let cadence = Cadence::Monthly { day, at: time(hour, minute)? };
        cadence.validate()?;
        Ok(cadence)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Cadence::Monthly { day, .. } if !(1..=28).contains(day) => Err(LedgerError::Configuration {
                message: format!("monthly cadence day must be within 1..=28, got {}", day),
            }),
            _ => Ok(()),
        }
    }

    /// first firing strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let date = after.date_naive();
        match *self {
            Cadence::Daily { at } => {
                let today = at_time(date, at);
                if today > after {
                    today
                } else {
                    at_time(date + Duration::days(1), at)
                }
            }
            Cadence::Weekly { weekday, at } => {
                let ahead = (7 + weekday.num_days_from_monday() as i64
                    - date.weekday().num_days_from_monday() as i64)
                    % 7;
                let candidate = at_time(date + Duration::days(ahead), at);
                if candidate > after {
                    candidate
                } else {
                    at_time(date + Duration::days(ahead + 7), at)
                }
            }
            Cadence::Monthly { day, at } => {
                let day = day.clamp(1, 28);
                let this_month = NaiveDate::from_ymd_opt(date.year(), date.month(), day)
                    .map(|d| at_time(d, at));
                match this_month {
                    Some(candidate) if candidate > after => candidate,
                    _ => {
                        let (year, month) = next_month(date.year(), date.month());
                        let next = NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date);
                        at_time(next, at)
                    }
                }
            }
        }
    }
}

fn at_time(date: NaiveDate, at: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(at))
}

/// calendar month following `(year, month)`
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// calendar month preceding `(year, month)`
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}
