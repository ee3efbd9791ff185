//! Dashboard-level analytics: projection, merge and aggregation in one pass.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use super::merge_service::{LedgerEntry, MergeService};
use super::summary_service::{AnalyticsSummary, CategoryBucket, MonthlyBucket, SummaryService};
use crate::config::EngineConfig;
use crate::ledger::{
    project_occurrences_bounded, DateWindow, LedgerTransaction, Occurrence, RecurringRule,
};

/// Everything a dashboard needs for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardReport {
    pub summary: AnalyticsSummary,
    pub monthly_trend: Vec<MonthlyBucket>,
    pub category_breakdown: Vec<CategoryBucket>,
}

pub struct AnalyticsService;

impl AnalyticsService {
    /// Projects every rule forward from its cursor into `window`. Rules are
    /// independent, so each one is expanded on the rayon pool; a malformed rule
    /// is skipped and logged.
    pub fn project_all(
        rules: &[RecurringRule],
        window: DateWindow,
        limit: usize,
    ) -> Vec<Occurrence> {
        rules
            .par_iter()
            .filter_map(|rule| {
                let window = forward_window(rule, window)?;
                match project_occurrences_bounded(rule, window, limit) {
                    Ok(occurrences) => Some(occurrences),
                    Err(err) => {
                        tracing::warn!(rule_id = %rule.id, error = %err, "skipping malformed rule");
                        None
                    }
                }
            })
            .flatten()
            .collect()
    }

    /// Merged stream of real and projected entries for `window`.
    pub fn ledger_view(
        rules: &[RecurringRule],
        transactions: &[LedgerTransaction],
        window: DateWindow,
        config: &EngineConfig,
    ) -> Vec<LedgerEntry> {
        let projected = Self::project_all(rules, window, config.max_occurrences_per_rule);
        MergeService::merge(transactions, projected, window)
    }

    pub fn report(
        rules: &[RecurringRule],
        transactions: &[LedgerTransaction],
        window: DateWindow,
        config: &EngineConfig,
    ) -> DashboardReport {
        let entries = Self::ledger_view(rules, transactions, window, config);
        let report = DashboardReport {
            summary: SummaryService::summarize(&entries, window),
            monthly_trend: SummaryService::monthly_trend(&entries, window),
            category_breakdown: SummaryService::category_breakdown_labelled(
                &entries,
                &config.uncategorized_label,
            ),
        };
        tracing::info!(
            window = %window,
            rules = rules.len(),
            entries = report.summary.entry_count,
            projected = report.summary.projected_count,
            "built dashboard report"
        );
        report
    }

    /// Projected occurrences in the `days` days starting at `from`, ordered by
    /// date then rule id.
    pub fn upcoming(
        rules: &[RecurringRule],
        from: NaiveDate,
        days: u32,
        config: &EngineConfig,
    ) -> Vec<Occurrence> {
        let window = DateWindow::starting_at(from, i64::from(days));
        let mut upcoming = Self::project_all(rules, window, config.max_occurrences_per_rule);
        upcoming.sort_by_key(|occ| (occ.date, occ.rule_id));
        upcoming
    }
}

/// Dates before the cursor are either materialized or were skipped while the
/// rule was paused, so only the part of `window` from the cursor on is projected.
fn forward_window(rule: &RecurringRule, window: DateWindow) -> Option<DateWindow> {
    match rule.next_occurrence {
        Some(cursor) if cursor > window.end => None,
        Some(cursor) => Some(DateWindow {
            start: window.start.max(cursor),
            end: window.end,
        }),
        None => Some(window),
    }
}
