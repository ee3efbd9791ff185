use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar unit a recurring rule steps by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn unit_name(&self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

/// A frequency paired with its step multiplier, e.g. "every 2 weeks".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeInterval {
    pub every: u32,
    pub unit: Frequency,
}

impl TimeInterval {
    pub fn new(every: u32, unit: Frequency) -> Self {
        Self { every, unit }
    }

    pub fn label(&self) -> String {
        match (self.every, self.unit) {
            (1, Frequency::Daily) => "Daily".into(),
            (1, Frequency::Weekly) => "Weekly".into(),
            (1, Frequency::Monthly) => "Monthly".into(),
            (1, Frequency::Yearly) => "Yearly".into(),
            (n, unit) => format!("Every {} {}s", n, unit.unit_name()),
        }
    }

    /// Length of one step in days for the fixed-length units.
    pub fn step_days(&self) -> Option<i64> {
        match self.unit {
            Frequency::Daily => Some(self.every as i64),
            Frequency::Weekly => Some(self.every as i64 * 7),
            Frequency::Monthly | Frequency::Yearly => None,
        }
    }
}

/// Absolute month counter: `year * 12 + (month - 1)`.
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Builds the date `day` within the month identified by `index`, clamping the
/// day to the month's last valid day.
pub fn date_in_month(index: i64, day: u32) -> Option<NaiveDate> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    let day = day.clamp(1, days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Same month/day in `year`, with 29 February clamped to the 28th in common years.
pub fn date_in_year(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some((first_next - Duration::days(1)).day())
}

/// First day of the month following `date`'s month.
pub fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    date_in_month(month_index(date) + 1, 1)
}
