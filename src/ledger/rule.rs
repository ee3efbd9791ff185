use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    money::Money,
    recurring::{compute_next_occurrence, NextOccurrence},
    time_interval::{Frequency, TimeInterval},
    transaction::EntryKind,
};
use crate::errors::{TransitionError, ValidationError};

/// Lifecycle of a recurring rule. `Exhausted` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum RuleState {
    /// Created but not yet materialized; projects like `Active`.
    #[default]
    Scheduled,
    Active,
    Paused,
    Exhausted,
}

impl RuleState {
    /// Whether forward projections should be produced for this state.
    pub fn is_projectable(self) -> bool {
        matches!(self, RuleState::Scheduled | RuleState::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RuleState::Exhausted)
    }
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuleState::Scheduled => "Scheduled",
            RuleState::Active => "Active",
            RuleState::Paused => "Paused",
            RuleState::Exhausted => "Exhausted",
        };
        f.write_str(label)
    }
}

/// Unvalidated input for creating a rule.
///
/// `interval` is signed so that nonsensical input (zero or negative) can be
/// reported back instead of wrapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleDraft {
    pub kind: EntryKind,
    pub amount: Money,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub frequency: Frequency,
    #[serde(default = "RuleDraft::default_interval")]
    pub interval: i64,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RuleDraft {
    /// Monthly drafts default their day of month to the start date's day.
    pub fn new(kind: EntryKind, amount: Money, frequency: Frequency, start_date: NaiveDate) -> Self {
        Self {
            kind,
            amount,
            category: String::new(),
            description: String::new(),
            frequency,
            interval: Self::default_interval(),
            day_of_month: (frequency == Frequency::Monthly).then(|| start_date.day()),
            start_date,
            end_date: None,
        }
    }

    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_interval() -> i64 {
        1
    }

    /// Checks every field and returns the interval narrowed to its stored width.
    pub fn validate(&self) -> Result<u32, ValidationError> {
        validate_amount(self.amount)?;
        let interval = u32::try_from(self.interval)
            .ok()
            .filter(|every| *every >= 1)
            .ok_or(ValidationError::InvalidInterval(self.interval))?;
        validate_schedule_fields(
            self.frequency,
            interval,
            self.day_of_month,
            self.start_date,
            self.end_date,
        )?;
        Ok(interval)
    }
}

/// Partial update applied through [`RecurringRule::apply`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RulePatch {
    pub kind: Option<EntryKind>,
    pub amount: Option<Money>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub interval: Option<i64>,
    pub day_of_month: Option<Option<u32>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
}

impl RulePatch {
    fn touches_schedule(&self) -> bool {
        self.frequency.is_some()
            || self.interval.is_some()
            || self.day_of_month.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
    }
}

/// A recurring income or expense definition with its materialization cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringRule {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub state: RuleState,
    pub next_occurrence: Option<NaiveDate>,
    #[serde(default)]
    pub last_materialized: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringRule {
    /// Validates `draft` and builds a `Scheduled` rule whose cursor points at the
    /// first occurrence on or after the start date. A rule whose end date leaves
    /// no valid occurrence is created already `Exhausted`.
    pub fn create(owner_id: Uuid, draft: RuleDraft) -> Result<Self, ValidationError> {
        let interval = draft.validate()?;
        let now = Utc::now();
        let mut rule = Self {
            id: Uuid::new_v4(),
            owner_id,
            kind: draft.kind,
            amount: draft.amount,
            category: draft.category.trim().to_string(),
            description: draft.description.trim().to_string(),
            frequency: draft.frequency,
            interval,
            day_of_month: draft.day_of_month,
            start_date: draft.start_date,
            end_date: draft.end_date,
            state: RuleState::Scheduled,
            next_occurrence: None,
            last_materialized: None,
            created_at: now,
            updated_at: now,
        };
        rule.reseat_cursor(rule.start_date)?;
        Ok(rule)
    }

    pub fn time_interval(&self) -> TimeInterval {
        TimeInterval::new(self.interval, self.frequency)
    }

    /// Re-checks an already-built rule, e.g. one read back from a book file.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_amount(self.amount)?;
        if self.interval == 0 {
            return Err(ValidationError::InvalidInterval(0));
        }
        validate_schedule_fields(
            self.frequency,
            self.interval,
            self.day_of_month,
            self.start_date,
            self.end_date,
        )
    }

    /// Applies `patch`, re-validating the merged rule. Schedule changes re-seat
    /// the cursor after the last materialized date; a rule left without any
    /// further occurrence becomes `Exhausted`.
    pub fn apply(&mut self, patch: RulePatch) -> Result<(), ValidationError> {
        let reschedule = patch.touches_schedule();
        let frequency = patch.frequency.unwrap_or(self.frequency);
        let start_date = patch.start_date.unwrap_or(self.start_date);
        let day_of_month = match patch.day_of_month {
            Some(day) => day,
            None if frequency != Frequency::Monthly => None,
            None => self.day_of_month.or(Some(start_date.day())),
        };
        let draft = RuleDraft {
            kind: patch.kind.unwrap_or(self.kind),
            amount: patch.amount.unwrap_or(self.amount),
            category: patch.category.unwrap_or_else(|| self.category.clone()),
            description: patch.description.unwrap_or_else(|| self.description.clone()),
            frequency,
            interval: patch.interval.unwrap_or(self.interval as i64),
            day_of_month,
            start_date,
            end_date: patch.end_date.unwrap_or(self.end_date),
        };
        let interval = draft.validate()?;

        let mut updated = self.clone();
        updated.kind = draft.kind;
        updated.amount = draft.amount;
        updated.category = draft.category.trim().to_string();
        updated.description = draft.description.trim().to_string();
        updated.frequency = draft.frequency;
        updated.interval = interval;
        updated.day_of_month = draft.day_of_month;
        updated.start_date = draft.start_date;
        updated.end_date = draft.end_date;
        if reschedule && !updated.state.is_terminal() {
            let floor = updated.materialization_floor(updated.start_date);
            updated.reseat_cursor(floor)?;
        }
        updated.touch();
        *self = updated;
        Ok(())
    }

    /// Flips Active/Scheduled to Paused and Paused back to Active.
    pub fn toggle(&mut self, today: NaiveDate) -> Result<RuleState, TransitionError> {
        match self.state {
            RuleState::Paused => self.resume(today)?,
            _ => self.pause()?,
        }
        Ok(self.state)
    }

    pub fn pause(&mut self) -> Result<(), TransitionError> {
        match self.state {
            RuleState::Exhausted => Err(TransitionError {
                from: self.state,
                action: "pause",
            }),
            RuleState::Paused => Ok(()),
            RuleState::Scheduled | RuleState::Active => {
                self.state = RuleState::Paused;
                self.touch();
                Ok(())
            }
        }
    }

    /// Resumes a paused rule. The cursor skips ahead to `today` so the paused
    /// stretch is not back-filled by materialization.
    pub fn resume(&mut self, today: NaiveDate) -> Result<(), TransitionError> {
        match self.state {
            RuleState::Paused => {
                self.state = RuleState::Active;
                let floor = self.materialization_floor(today.max(self.start_date));
                if self.reseat_cursor(floor).is_err() {
                    // Schedule fields were validated on the way in; treat an
                    // unschedulable rule as finished rather than resuming it.
                    self.mark_exhausted();
                }
                self.touch();
                Ok(())
            }
            RuleState::Scheduled | RuleState::Active => Ok(()),
            RuleState::Exhausted => Err(TransitionError {
                from: self.state,
                action: "resume",
            }),
        }
    }

    pub fn mark_exhausted(&mut self) {
        self.state = RuleState::Exhausted;
        self.next_occurrence = None;
        self.touch();
    }

    /// Due for materialization when projectable and the cursor has been reached.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.state.is_projectable() && self.next_occurrence.is_some_and(|next| next <= today)
    }

    /// True once the rule can never produce another occurrence as of `today`.
    pub fn is_spent(&self, today: NaiveDate) -> bool {
        if self.state.is_terminal() {
            return true;
        }
        self.next_occurrence.is_none() || self.end_date.is_some_and(|end| end < today)
    }

    /// Records that `materialized` became a real transaction and moves the cursor
    /// to `next`. The first materialization promotes `Scheduled` to `Active`.
    pub fn record_materialization(&mut self, materialized: NaiveDate, next: NextOccurrence) {
        self.last_materialized = Some(materialized);
        match next {
            NextOccurrence::On(date) => {
                self.next_occurrence = Some(date);
                if self.state == RuleState::Scheduled {
                    self.state = RuleState::Active;
                }
            }
            NextOccurrence::Exhausted => {
                self.state = RuleState::Exhausted;
                self.next_occurrence = None;
            }
        }
        self.touch();
    }

    /// The occurrence that would follow `materialized` on this rule's schedule.
    pub fn following(&self, materialized: NaiveDate) -> Result<NextOccurrence, ValidationError> {
        match materialized.succ_opt() {
            Some(reference) => compute_next_occurrence(self, reference),
            None => Ok(NextOccurrence::Exhausted),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn materialization_floor(&self, candidate: NaiveDate) -> NaiveDate {
        match self.last_materialized.and_then(|last| last.succ_opt()) {
            Some(after_last) => candidate.max(after_last),
            None => candidate,
        }
    }

    fn reseat_cursor(&mut self, floor: NaiveDate) -> Result<(), ValidationError> {
        match compute_next_occurrence(self, floor)? {
            NextOccurrence::On(date) => self.next_occurrence = Some(date),
            NextOccurrence::Exhausted => {
                self.state = RuleState::Exhausted;
                self.next_occurrence = None;
            }
        }
        Ok(())
    }
}

fn validate_amount(amount: Money) -> Result<(), ValidationError> {
    if !amount.is_positive() {
        return Err(ValidationError::NonPositiveAmount);
    }
    if amount > Money::MAX_RULE_AMOUNT {
        return Err(ValidationError::AmountTooLarge {
            amount,
            max: Money::MAX_RULE_AMOUNT,
        });
    }
    Ok(())
}

fn validate_schedule_fields(
    frequency: Frequency,
    interval: u32,
    day_of_month: Option<u32>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if interval == 0 {
        return Err(ValidationError::InvalidInterval(0));
    }
    match (frequency, day_of_month) {
        (Frequency::Monthly, None) => return Err(ValidationError::MissingDayOfMonth),
        (Frequency::Monthly, Some(day)) if !(1..=31).contains(&day) => {
            return Err(ValidationError::DayOfMonthOutOfRange(day))
        }
        (Frequency::Monthly, Some(_)) => {}
        (other, Some(_)) => return Err(ValidationError::UnexpectedDayOfMonth(other)),
        (_, None) => {}
    }
    if let Some(end) = end_date {
        if end < start_date {
            return Err(ValidationError::EndBeforeStart {
                start: start_date,
                end,
            });
        }
    }
    Ok(())
}
