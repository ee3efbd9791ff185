//! Schedule arithmetic and forward projection for recurring rules.
//!
//! Every function here is pure: the same rule and dates always produce the same
//! result, so callers may run them per rule on any thread.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    money::Money,
    rule::{RecurringRule, RuleState},
    time_interval::{date_in_month, date_in_year, month_index, Frequency},
    transaction::EntryKind,
    window::DateWindow,
};
use crate::errors::ValidationError;

/// Upper bound on occurrences projected for a single rule in one call.
pub const MAX_PROJECTED_OCCURRENCES: usize = 4096;

/// Result of asking a rule for its next occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextOccurrence {
    On(NaiveDate),
    /// No further occurrence exists.
    Exhausted,
}

impl NextOccurrence {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            NextOccurrence::On(date) => Some(date),
            NextOccurrence::Exhausted => None,
        }
    }
}

/// A virtual, not yet materialized instance of a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Occurrence {
    pub rule_id: Uuid,
    pub date: NaiveDate,
    pub amount: Money,
    pub kind: EntryKind,
    pub category: String,
    pub description: String,
    pub is_projected: bool,
}

impl Occurrence {
    fn of(rule: &RecurringRule, date: NaiveDate) -> Self {
        Self {
            rule_id: rule.id,
            date,
            amount: rule.amount,
            kind: rule.kind,
            category: rule.category.clone(),
            description: rule.description.clone(),
            is_projected: true,
        }
    }
}

/// Smallest date `>= reference` on the rule's schedule anchored at its start
/// date, or `Exhausted` once the end date has been passed.
///
/// Month and year steps clamp the day to the target month's length, so a
/// day-31 rule lands on 30 April and 28 or 29 February.
pub fn compute_next_occurrence(
    rule: &RecurringRule,
    reference: NaiveDate,
) -> Result<NextOccurrence, ValidationError> {
    rule.validate()?;
    if rule.state == RuleState::Exhausted {
        return Ok(NextOccurrence::Exhausted);
    }
    let next = match schedule_candidate(rule, reference) {
        Some(date) if rule.end_date.map_or(true, |end| date <= end) => {
            NextOccurrence::On(date)
        }
        _ => NextOccurrence::Exhausted,
    };
    Ok(next)
}

/// Expands `rule` into its occurrences inside `window`, in date order.
pub fn project_occurrences(
    rule: &RecurringRule,
    window: DateWindow,
) -> Result<Vec<Occurrence>, ValidationError> {
    project_occurrences_bounded(rule, window, MAX_PROJECTED_OCCURRENCES)
}

/// [`project_occurrences`] with an explicit cap on the number of occurrences.
pub fn project_occurrences_bounded(
    rule: &RecurringRule,
    window: DateWindow,
    limit: usize,
) -> Result<Vec<Occurrence>, ValidationError> {
    let (occurrences, truncated) = expand(rule, window, limit)?;
    if truncated {
        tracing::warn!(
            rule_id = %rule.id,
            limit,
            window = %window,
            "projection truncated at occurrence limit"
        );
    }
    tracing::debug!(rule_id = %rule.id, count = occurrences.len(), "projected rule");
    Ok(occurrences)
}

/// Occurrences of `rule` in `window` up to `limit`, plus whether an in-window
/// occurrence was left out because of the limit.
fn expand(
    rule: &RecurringRule,
    window: DateWindow,
    limit: usize,
) -> Result<(Vec<Occurrence>, bool), ValidationError> {
    rule.validate()?;
    if !rule.state.is_projectable() {
        tracing::debug!(rule_id = %rule.id, state = %rule.state, "rule not projectable");
        return Ok((Vec::new(), false));
    }

    let mut occurrences: Vec<Occurrence> = Vec::new();
    let mut reference = rule.start_date.max(window.start);
    while occurrences.len() < limit {
        let date = match compute_next_occurrence(rule, reference)? {
            NextOccurrence::On(date) if date <= window.end => date,
            _ => break,
        };
        occurrences.push(Occurrence::of(rule, date));
        match date.succ_opt() {
            Some(next) => reference = next,
            None => break,
        }
    }

    let truncated = occurrences.len() >= limit
        && match compute_next_occurrence(rule, reference)? {
            NextOccurrence::On(date) => {
                date <= window.end && occurrences.last().map_or(true, |last| date > last.date)
            }
            NextOccurrence::Exhausted => false,
        };
    Ok((occurrences, truncated))
}

fn schedule_candidate(rule: &RecurringRule, reference: NaiveDate) -> Option<NaiveDate> {
    let start = rule.start_date;
    let floor = reference.max(start);
    match rule.frequency {
        Frequency::Daily | Frequency::Weekly => {
            let step = rule.time_interval().step_days()?;
            let elapsed = (floor - start).num_days();
            let steps = (elapsed + step - 1) / step;
            start.checked_add_signed(Duration::days(steps.checked_mul(step)?))
        }
        Frequency::Monthly => {
            let day = rule.day_of_month?;
            let anchor = month_index(start);
            let every = rule.interval as i64;
            let mut steps = (month_index(floor) - anchor) / every;
            loop {
                // Clamping can leave the candidate behind `floor`; take one more step.
                let candidate = date_in_month(anchor + steps.checked_mul(every)?, day)?;
                if candidate >= floor {
                    return Some(candidate);
                }
                steps += 1;
            }
        }
        Frequency::Yearly => {
            let every = i32::try_from(rule.interval).ok()?;
            let mut steps = (floor.year() - start.year()) / every;
            loop {
                let year = start.year().checked_add(steps.checked_mul(every)?)?;
                let candidate = date_in_year(year, start.month(), start.day())?;
                if candidate >= floor {
                    return Some(candidate);
                }
                steps += 1;
            }
        }
    }
}
