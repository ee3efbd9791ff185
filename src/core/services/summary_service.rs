//! Period totals, monthly trend, and category breakdown over a merged stream.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::merge_service::LedgerEntry;
use crate::errors::AggregationInputError;
use crate::ledger::{DateWindow, EntryKind, Money};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Calendar month identifier, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Income and expense totals over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_income: Money,
    pub total_expense: Money,
    pub balance: Money,
    pub period: DateWindow,
    pub entry_count: usize,
    pub projected_count: usize,
}

impl AnalyticsSummary {
    /// Share of income left after expenses, in percent, floored at zero.
    pub fn savings_rate(&self) -> Option<Decimal> {
        self.balance
            .percent_of(self.total_income)
            .map(|rate| rate.max(Decimal::ZERO))
    }

    /// Expenses as a percentage of income.
    pub fn expense_ratio(&self) -> Option<Decimal> {
        self.total_expense.percent_of(self.total_income)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub month_key: MonthKey,
    pub income: Money,
    pub expense: Money,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBucket {
    pub category: String,
    pub total: Money,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Default)]
struct Totals {
    income: Money,
    expense: Money,
}

impl Totals {
    fn add(&mut self, entry: &LedgerEntry) {
        match entry.kind() {
            EntryKind::Income => self.income += entry.amount(),
            EntryKind::Expense => self.expense += entry.amount(),
        }
    }
}

pub struct SummaryService;

impl SummaryService {
    pub fn summarize(entries: &[LedgerEntry], window: DateWindow) -> AnalyticsSummary {
        let mut totals = Totals::default();
        let mut entry_count = 0usize;
        let mut projected_count = 0usize;
        for entry in within(entries, window) {
            totals.add(entry);
            entry_count += 1;
            if entry.is_projected() {
                projected_count += 1;
            }
        }
        AnalyticsSummary {
            total_income: totals.income,
            total_expense: totals.expense,
            balance: totals.income - totals.expense,
            period: window,
            entry_count,
            projected_count,
        }
    }

    /// One bucket per calendar month the window touches, zero-filled and in order.
    pub fn monthly_trend(entries: &[LedgerEntry], window: DateWindow) -> Vec<MonthlyBucket> {
        let mut months: BTreeMap<MonthKey, Totals> = window
            .months()
            .map(|first| (MonthKey::of(first), Totals::default()))
            .collect();
        for entry in within(entries, window) {
            months
                .entry(MonthKey::of(entry.date()))
                .or_default()
                .add(entry);
        }
        months
            .into_iter()
            .map(|(month_key, totals)| MonthlyBucket {
                month_key,
                income: totals.income,
                expense: totals.expense,
                balance: totals.income - totals.expense,
            })
            .collect()
    }

    pub fn category_breakdown(entries: &[LedgerEntry]) -> Vec<CategoryBucket> {
        Self::category_breakdown_labelled(entries, UNCATEGORIZED)
    }

    /// Totals per `(category, type)`, largest first, ties broken by name.
    /// Blank categories are reported under `uncategorized`.
    pub fn category_breakdown_labelled(
        entries: &[LedgerEntry],
        uncategorized: &str,
    ) -> Vec<CategoryBucket> {
        let mut groups: HashMap<(&str, EntryKind), (Money, usize)> = HashMap::new();
        for entry in entries {
            let name = match entry.category().trim() {
                "" => uncategorized,
                name => name,
            };
            let slot = groups.entry((name, entry.kind())).or_default();
            slot.0 += entry.amount();
            slot.1 += 1;
        }
        let mut buckets: Vec<CategoryBucket> = groups
            .into_iter()
            .map(|((category, kind), (total, count))| CategoryBucket {
                category: category.to_string(),
                total,
                count,
                kind,
            })
            .collect();
        buckets.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        buckets
    }
}

fn within(entries: &[LedgerEntry], window: DateWindow) -> impl Iterator<Item = &LedgerEntry> {
    entries.iter().filter(move |entry| {
        let inside = window.contains(entry.date());
        if !inside {
            let err = AggregationInputError {
                rule_id: entry.rule_id(),
                date: entry.date(),
                window,
            };
            tracing::warn!(error = %err, "excluding entry from aggregation");
        }
        inside
    })
}
