use std::io::{self, Write};

use rust_decimal::Decimal;

use crate::config::EngineConfig;
use crate::core::services::DashboardReport;
use crate::core::MaterializeReport;
use crate::ledger::{Money, Occurrence};

const SEPARATOR: &str = "----------------------------------------";

/// Renders `amount` with the configured precision and currency code.
pub fn format_money(amount: Money, config: &EngineConfig) -> String {
    format!("{} {}", amount.to_decimal(config.minor_unit_digits), config.currency)
}

fn format_percent(value: Option<Decimal>) -> String {
    match value {
        Some(rate) => format!("{rate}%"),
        None => "n/a".into(),
    }
}

fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "=== {} ===", title.trim())
}

pub fn write_report<W: Write>(
    out: &mut W,
    report: &DashboardReport,
    config: &EngineConfig,
) -> io::Result<()> {
    let summary = &report.summary;
    section(out, &format!("Summary {}", summary.period))?;
    writeln!(out, "Income:        {}", format_money(summary.total_income, config))?;
    writeln!(out, "Expenses:      {}", format_money(summary.total_expense, config))?;
    writeln!(out, "Balance:       {}", format_money(summary.balance, config))?;
    writeln!(out, "Savings rate:  {}", format_percent(summary.savings_rate()))?;
    writeln!(out, "Expense ratio: {}", format_percent(summary.expense_ratio()))?;
    writeln!(
        out,
        "Entries:       {} ({} projected)",
        summary.entry_count, summary.projected_count
    )?;

    writeln!(out)?;
    section(out, "Monthly trend")?;
    for bucket in &report.monthly_trend {
        writeln!(
            out,
            "{}  income {:>16}  expense {:>16}  balance {:>16}",
            bucket.month_key,
            format_money(bucket.income, config),
            format_money(bucket.expense, config),
            format_money(bucket.balance, config),
        )?;
    }

    writeln!(out)?;
    section(out, "Categories")?;
    if report.category_breakdown.is_empty() {
        writeln!(out, "(none)")?;
    }
    for bucket in &report.category_breakdown {
        writeln!(
            out,
            "{:<20} {:<8} {:>16}  x{}",
            bucket.category,
            bucket.kind,
            format_money(bucket.total, config),
            bucket.count
        )?;
    }
    Ok(())
}

pub fn write_upcoming<W: Write>(
    out: &mut W,
    upcoming: &[Occurrence],
    config: &EngineConfig,
) -> io::Result<()> {
    section(out, "Upcoming")?;
    if upcoming.is_empty() {
        writeln!(out, "Nothing scheduled.")?;
        return Ok(());
    }
    for occurrence in upcoming {
        let label = if occurrence.description.is_empty() {
            &occurrence.category
        } else {
            &occurrence.description
        };
        writeln!(
            out,
            "{}  {:<8} {:>16}  {}",
            occurrence.date,
            occurrence.kind,
            format_money(occurrence.amount, config),
            label
        )?;
    }
    Ok(())
}

pub fn write_materialized<W: Write>(
    out: &mut W,
    report: &MaterializeReport,
    config: &EngineConfig,
) -> io::Result<()> {
    section(out, "Materialized")?;
    for txn in &report.created {
        writeln!(
            out,
            "{}  {:<8} {:>16}  {}",
            txn.date,
            txn.kind,
            format_money(txn.amount, config),
            txn.category
        )?;
    }
    writeln!(out, "{SEPARATOR}")?;
    for rule_id in &report.skipped {
        writeln!(out, "skipped malformed rule {rule_id}")?;
    }
    writeln!(
        out,
        "{} created, {} conflicts, {} rules exhausted",
        report.created.len(),
        report.conflicts,
        report.exhausted.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_uses_configured_currency_and_digits() {
        let config = EngineConfig {
            currency: "JPY".into(),
            minor_unit_digits: 0,
            ..EngineConfig::default()
        };
        assert_eq!(format_money(Money::from_minor(1_500), &config), "1500 JPY");
        assert_eq!(
            format_money(Money::from_minor(-1_599), &EngineConfig::default()),
            "-15.99 USD"
        );
    }

    #[test]
    fn empty_upcoming_says_so() {
        let mut out = Vec::new();
        write_upcoming(&mut out, &[], &EngineConfig::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Nothing scheduled."));
    }
}
