//! Turns due rule occurrences into real ledger transactions.
//!
//! The rule cursor is advanced with a compare-and-set before the transaction is
//! appended, so of several callers racing on the same occurrence exactly one
//! records it.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::services::{RuleService, ServiceError, ServiceResult};
use crate::errors::StorageError;
use crate::ledger::{LedgerTransaction, RecurringRule, RuleState};
use crate::storage::{LedgerStore, RuleStore};

/// Outcome of one materialization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub created: Vec<LedgerTransaction>,
    pub conflicts: usize,
    pub exhausted: Vec<Uuid>,
    /// Rules left alone because their stored fields do not validate.
    pub skipped: Vec<Uuid>,
}

impl MaterializeReport {
    fn absorb(&mut self, other: MaterializeReport) {
        self.created.extend(other.created);
        self.conflicts += other.conflicts;
        self.exhausted.extend(other.exhausted);
        self.skipped.extend(other.skipped);
    }
}

pub struct Materializer<'a, R: ?Sized, L: ?Sized> {
    rules: &'a R,
    ledger: &'a L,
    retry_limit: u32,
}

impl<'a, R, L> Materializer<'a, R, L>
where
    R: RuleStore + ?Sized,
    L: LedgerStore + ?Sized,
{
    pub fn new(rules: &'a R, ledger: &'a L, config: &EngineConfig) -> Self {
        Self {
            rules,
            ledger,
            retry_limit: config.materialize_retry_limit,
        }
    }

    /// Materializes every due occurrence of every rule owned by `owner_id`, then
    /// sweeps rules that can no longer fire. A rule that fails validation is
    /// logged and skipped; the others are still caught up.
    pub fn run(&self, owner_id: Uuid, today: NaiveDate) -> ServiceResult<MaterializeReport> {
        let mut report = MaterializeReport::default();
        for rule in self.rules.rules_for_owner(owner_id)? {
            if !rule.is_due(today) {
                continue;
            }
            let rule_id = rule.id;
            match self.materialize_rule(rule, today) {
                Ok(caught_up) => report.absorb(caught_up),
                Err(ServiceError::Validation(err)) => {
                    tracing::warn!(rule_id = %rule_id, error = %err, "skipping malformed rule");
                    report.skipped.push(rule_id);
                }
                Err(err) => return Err(err),
            }
        }
        for rule_id in RuleService::sweep_exhausted(self.rules, owner_id, today)? {
            if !report.exhausted.contains(&rule_id) {
                report.exhausted.push(rule_id);
            }
        }
        tracing::info!(
            owner_id = %owner_id,
            %today,
            created = report.created.len(),
            conflicts = report.conflicts,
            exhausted = report.exhausted.len(),
            skipped = report.skipped.len(),
            "materialization pass finished"
        );
        Ok(report)
    }

    /// Catches a single rule up to `today`.
    pub fn materialize_rule(
        &self,
        mut rule: RecurringRule,
        today: NaiveDate,
    ) -> ServiceResult<MaterializeReport> {
        let mut report = MaterializeReport::default();
        let mut consecutive_conflicts = 0u32;
        rule.validate()?;

        while rule.is_due(today) {
            let Some(cursor) = rule.next_occurrence else {
                break;
            };
            let next = rule.following(cursor)?;
            match self.rules.advance_cursor(rule.id, Some(cursor), cursor, next) {
                Ok(advanced) => {
                    consecutive_conflicts = 0;
                    let txn = occurrence_transaction(&advanced, cursor);
                    self.ledger.append(txn.clone())?;
                    tracing::info!(rule_id = %advanced.id, date = %cursor, "materialized occurrence");
                    report.created.push(txn);
                    if advanced.state == RuleState::Exhausted {
                        report.exhausted.push(advanced.id);
                    }
                    rule = advanced;
                }
                Err(StorageError::ConcurrencyConflict { actual, .. }) => {
                    report.conflicts += 1;
                    consecutive_conflicts += 1;
                    tracing::warn!(
                        rule_id = %rule.id,
                        expected = %cursor,
                        actual = ?actual,
                        attempt = consecutive_conflicts,
                        "cursor advanced concurrently"
                    );
                    if consecutive_conflicts > self.retry_limit {
                        break;
                    }
                    rule = self.rules.load_rule(rule.id)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(report)
    }
}

fn occurrence_transaction(rule: &RecurringRule, date: NaiveDate) -> LedgerTransaction {
    LedgerTransaction::new(rule.owner_id, rule.kind, rule.amount, rule.category.clone(), date)
        .with_description(rule.description.clone())
        .with_source_rule(rule.id)
}
