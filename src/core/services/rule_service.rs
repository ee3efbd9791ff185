//! Lifecycle operations for recurring rules.

use chrono::NaiveDate;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::errors::StorageError;
use crate::ledger::{RecurringRule, RuleDraft, RulePatch, RuleState};
use crate::storage::RuleStore;

/// Attempts at a read-modify-write before a lost race is reported.
const REPLACE_ATTEMPTS: u32 = 8;

/// Validated create/update/toggle helpers over a [`RuleStore`].
pub struct RuleService;

impl RuleService {
    /// Validates `draft`, persists the new rule and returns it.
    pub fn create<S>(store: &S, owner_id: Uuid, draft: RuleDraft) -> ServiceResult<RecurringRule>
    where
        S: RuleStore + ?Sized,
    {
        let rule = RecurringRule::create(owner_id, draft)?;
        store.save_rule(&rule)?;
        tracing::info!(
            rule_id = %rule.id,
            owner_id = %owner_id,
            schedule = %rule.time_interval().label(),
            state = %rule.state,
            "created recurring rule"
        );
        Ok(rule)
    }

    /// Applies `patch` to the stored rule. Invalid patches leave the rule untouched.
    pub fn update<S>(store: &S, rule_id: Uuid, patch: RulePatch) -> ServiceResult<RecurringRule>
    where
        S: RuleStore + ?Sized,
    {
        let (_, rule) = modify(store, rule_id, |rule| {
            rule.apply(patch.clone())?;
            Ok(true)
        })?;
        tracing::info!(rule_id = %rule.id, next = ?rule.next_occurrence, "updated recurring rule");
        Ok(rule)
    }

    /// Pauses or resumes the rule. Fails for exhausted rules.
    pub fn toggle<S>(store: &S, rule_id: Uuid, today: NaiveDate) -> ServiceResult<RecurringRule>
    where
        S: RuleStore + ?Sized,
    {
        let (before, rule) = modify(store, rule_id, |rule| {
            rule.toggle(today)?;
            Ok(true)
        })?;
        let from = before.state;
        tracing::info!(rule_id = %rule.id, %from, to = %rule.state, "toggled recurring rule");
        Ok(rule)
    }

    pub fn delete<S>(store: &S, rule_id: Uuid) -> ServiceResult<RecurringRule>
    where
        S: RuleStore + ?Sized,
    {
        let removed = store.delete_rule(rule_id)?;
        tracing::info!(rule_id = %rule_id, "deleted recurring rule");
        Ok(removed)
    }

    pub fn list<S>(store: &S, owner_id: Uuid) -> ServiceResult<Vec<RecurringRule>>
    where
        S: RuleStore + ?Sized,
    {
        Ok(store.rules_for_owner(owner_id)?)
    }

    /// Marks rules that can no longer produce an occurrence as `Exhausted`,
    /// returning their ids.
    pub fn sweep_exhausted<S>(store: &S, owner_id: Uuid, today: NaiveDate) -> ServiceResult<Vec<Uuid>>
    where
        S: RuleStore + ?Sized,
    {
        let mut swept = Vec::new();
        for rule in store.rules_for_owner(owner_id)? {
            if !should_sweep(&rule, today) {
                continue;
            }
            let (before, rule) = match modify(store, rule.id, |rule| {
                let sweep = should_sweep(rule, today);
                if sweep {
                    rule.mark_exhausted();
                }
                Ok(sweep)
            }) {
                Ok(modified) => modified,
                // Deleted while sweeping.
                Err(ServiceError::Storage(StorageError::RuleNotFound(_))) => continue,
                Err(err) => return Err(err),
            };
            if before.state != RuleState::Exhausted && rule.state == RuleState::Exhausted {
                tracing::info!(rule_id = %rule.id, "rule exhausted");
                swept.push(rule.id);
            }
        }
        Ok(swept)
    }
}

fn should_sweep(rule: &RecurringRule, today: NaiveDate) -> bool {
    if rule.state == RuleState::Exhausted || !rule.is_spent(today) {
        return false;
    }
    // A cursor still inside the end date is owed one last materialization.
    !(rule.next_occurrence.is_some_and(|next| next <= today) && rule.state.is_projectable())
}

/// Loads the rule, lets `change` edit a copy and swaps it in with
/// [`RuleStore::replace_rule`]. A concurrent write (typically a materializer
/// advancing the cursor) makes the swap fail, so the rule is reloaded and the
/// change recomputed from the fresh copy. `change` returns `false` to leave
/// the rule as it is.
///
/// Returns the rule as loaded and as stored afterwards.
fn modify<S, F>(store: &S, rule_id: Uuid, mut change: F) -> ServiceResult<(RecurringRule, RecurringRule)>
where
    S: RuleStore + ?Sized,
    F: FnMut(&mut RecurringRule) -> ServiceResult<bool>,
{
    let mut attempt = 1;
    loop {
        let current = store.load_rule(rule_id)?;
        let mut updated = current.clone();
        if !change(&mut updated)? {
            return Ok((current.clone(), current));
        }
        match store.replace_rule(&current, &updated) {
            Ok(()) => return Ok((current, updated)),
            Err(StorageError::ConcurrencyConflict { expected, actual, .. })
                if attempt < REPLACE_ATTEMPTS =>
            {
                tracing::debug!(
                    rule_id = %rule_id,
                    expected = ?expected,
                    actual = ?actual,
                    attempt,
                    "rule changed concurrently; retrying"
                );
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
