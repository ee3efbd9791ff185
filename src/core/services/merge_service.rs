//! Unifies real ledger transactions with projected rule occurrences.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AggregationInputError;
use crate::ledger::{DateWindow, EntryKind, LedgerTransaction, Money, Occurrence};

/// One row of the merged stream: either a recorded transaction or a projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum LedgerEntry {
    Real(LedgerTransaction),
    Projected(Occurrence),
}

impl LedgerEntry {
    pub fn date(&self) -> NaiveDate {
        match self {
            LedgerEntry::Real(txn) => txn.date,
            LedgerEntry::Projected(occ) => occ.date,
        }
    }

    pub fn amount(&self) -> Money {
        match self {
            LedgerEntry::Real(txn) => txn.amount,
            LedgerEntry::Projected(occ) => occ.amount,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            LedgerEntry::Real(txn) => txn.kind,
            LedgerEntry::Projected(occ) => occ.kind,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            LedgerEntry::Real(txn) => &txn.category,
            LedgerEntry::Projected(occ) => &occ.category,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            LedgerEntry::Real(txn) => &txn.description,
            LedgerEntry::Projected(occ) => &occ.description,
        }
    }

    /// Rule the entry came from: the projecting rule, or the source rule of a
    /// materialized transaction.
    pub fn rule_id(&self) -> Option<Uuid> {
        match self {
            LedgerEntry::Real(txn) => txn.source_rule_id,
            LedgerEntry::Projected(occ) => Some(occ.rule_id),
        }
    }

    pub fn is_projected(&self) -> bool {
        matches!(self, LedgerEntry::Projected(_))
    }

    /// Date, then real before projected, then transaction or rule id.
    fn sort_key(&self) -> (NaiveDate, bool, Uuid) {
        let identity = match self {
            LedgerEntry::Real(txn) => txn.id,
            LedgerEntry::Projected(occ) => occ.rule_id,
        };
        (self.date(), self.is_projected(), identity)
    }
}

pub struct MergeService;

impl MergeService {
    /// Merges `real` and `projected` into one stream restricted to `window`.
    ///
    /// A projection is dropped when a real transaction already materialized the
    /// same `(rule, date)`. The output order depends only on the entries, never
    /// on the order they arrived in.
    pub fn merge<I>(real: &[LedgerTransaction], projected: I, window: DateWindow) -> Vec<LedgerEntry>
    where
        I: IntoIterator<Item = Occurrence>,
    {
        let materialized: HashSet<(Uuid, NaiveDate)> = real
            .iter()
            .filter_map(LedgerTransaction::materialized_occurrence)
            .collect();

        let mut entries: Vec<LedgerEntry> = real
            .iter()
            .filter(|txn| window.contains(txn.date))
            .cloned()
            .map(LedgerEntry::Real)
            .collect();

        let mut seen = HashSet::new();
        let mut superseded = 0usize;
        for occurrence in projected {
            if !window.contains(occurrence.date) {
                let err = AggregationInputError {
                    rule_id: Some(occurrence.rule_id),
                    date: occurrence.date,
                    window,
                };
                tracing::warn!(error = %err, "excluding projection outside its window");
                continue;
            }
            let key = (occurrence.rule_id, occurrence.date);
            if materialized.contains(&key) {
                superseded += 1;
                continue;
            }
            if seen.insert(key) {
                entries.push(LedgerEntry::Projected(occurrence));
            }
        }

        entries.sort_by_key(LedgerEntry::sort_key);
        tracing::debug!(
            entries = entries.len(),
            superseded,
            window = %window,
            "merged ledger stream"
        );
        entries
    }
}
