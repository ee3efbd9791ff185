use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{DateWindow, Frequency, Money, RuleState};

/// Malformed rule or request parameters. Raised when a rule is created or
/// updated so that bad input never reaches the schedule calculator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("interval must be a positive integer, got {0}")]
    InvalidInterval(i64),
    #[error("monthly rules require a day of month")]
    MissingDayOfMonth,
    #[error("day of month must be between 1 and 31, got {0}")]
    DayOfMonthOutOfRange(u32),
    #[error("day of month is only valid for monthly rules, not {0}")]
    UnexpectedDayOfMonth(Frequency),
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("amount {amount} exceeds the maximum of {max}")]
    AmountTooLarge { amount: Money, max: Money },
    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
    #[error("window end {end} is before start {start}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
}

/// A state change the rule lifecycle does not permit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a rule in state {from}")]
pub struct TransitionError {
    pub from: RuleState,
    pub action: &'static str,
}

/// Failures raised by rule and ledger stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("rule {0} not found")]
    RuleNotFound(Uuid),
    #[error(
        "cursor of rule {rule_id} moved: expected {}, found {}",
        display_cursor(.expected),
        display_cursor(.actual)
    )]
    ConcurrencyConflict {
        rule_id: Uuid,
        expected: Option<NaiveDate>,
        actual: Option<NaiveDate>,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// An entry handed to aggregation that falls outside its requested window.
///
/// Never returned as an `Err`: the entry is logged and left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entry dated {date} (rule {rule_id:?}) lies outside window {window}")]
pub struct AggregationInputError {
    pub rule_id: Option<Uuid>,
    pub date: NaiveDate,
    pub window: DateWindow,
}

fn display_cursor(cursor: &Option<NaiveDate>) -> String {
    cursor
        .map(|date| date.to_string())
        .unwrap_or_else(|| "none".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_renders_missing_cursor_as_none() {
        let err = StorageError::ConcurrencyConflict {
            rule_id: Uuid::nil(),
            expected: NaiveDate::from_ymd_opt(2025, 1, 31),
            actual: None,
        };
        let message = err.to_string();
        assert!(message.contains("expected 2025-01-31"), "{message}");
        assert!(message.contains("found none"), "{message}");
    }

    #[test]
    fn transition_error_names_state_and_action() {
        let err = TransitionError {
            from: RuleState::Exhausted,
            action: "resume",
        };
        assert_eq!(err.to_string(), "cannot resume a rule in state Exhausted");
    }
}
