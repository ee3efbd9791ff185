use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::time_interval::{date_in_month, month_index, next_month_start};
use crate::errors::ValidationError;

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window of `days` days beginning at `start` (a zero-day window is just `start`).
    pub fn starting_at(start: NaiveDate, days: i64) -> Self {
        let end = start
            .checked_add_signed(Duration::days(days.max(1) - 1))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar months the window touches, counting partial months.
    pub fn month_span(&self) -> usize {
        (month_index(self.end) - month_index(self.start) + 1) as usize
    }

    /// First day of every month the window touches, in order.
    pub fn months(&self) -> impl Iterator<Item = NaiveDate> {
        let first = date_in_month(month_index(self.start), 1);
        std::iter::successors(first, |current| next_month_start(*current))
            .take(self.month_span())
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
