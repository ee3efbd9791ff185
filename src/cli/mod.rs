//! Command-line front end over the analytics and materialization services.

pub mod output;

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{ConfigError, ConfigManager, EngineConfig};
use crate::core::services::{AnalyticsService, ServiceError};
use crate::core::{Clock, Materializer, SystemClock};
use crate::errors::{StorageError, ValidationError};
use crate::ledger::DateWindow;
use crate::storage::{book_warnings, load_book_from_path, save_book_to_path, MemoryStore};
use crate::utils::build_info;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Recurring income and expense analytics over a JSON book.
#[derive(Parser, Debug)]
#[command(name = "recurring_core_cli", version)]
pub struct Cli {
    /// Engine config file. Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summary, monthly trend and category breakdown for a date range.
    Report {
        #[arg(long)]
        book: PathBuf,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Projected occurrences over the next few days.
    Upcoming {
        #[arg(long)]
        book: PathBuf,
        /// First day to look at. Defaults to today.
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Look-ahead in days. Defaults to the configured value.
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Records every due occurrence as a real transaction and saves the book.
    Materialize {
        #[arg(long)]
        book: PathBuf,
        /// Treat this date as today.
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Lists inconsistencies found in the book.
    Check {
        #[arg(long)]
        book: PathBuf,
    },
    /// Prints build metadata.
    Version,
}

pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli, &SystemClock, &mut out)
}

/// Executes a parsed command, writing human or JSON output to `out`.
pub fn run<W: Write>(cli: Cli, clock: &dyn Clock, out: &mut W) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Report {
            book,
            from,
            to,
            json,
        } => {
            let window = DateWindow::new(from, to)?;
            let book = load_book_from_path(&book)?;
            let report =
                AnalyticsService::report(&book.rules, &book.transactions, window, &config);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                output::write_report(out, &report, &config)?;
            }
        }
        Command::Upcoming {
            book,
            from,
            days,
            json,
        } => {
            let book = load_book_from_path(&book)?;
            let from = from.unwrap_or_else(|| clock.today());
            let days = days.unwrap_or(config.upcoming_days);
            let upcoming = AnalyticsService::upcoming(&book.rules, from, days, &config);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&upcoming)?)?;
            } else {
                output::write_upcoming(out, &upcoming, &config)?;
            }
        }
        Command::Materialize { book: path, today } => {
            let today = today.unwrap_or_else(|| clock.today());
            let book = load_book_from_path(&path)?;
            let owner_id = book.owner_id;
            let store = MemoryStore::from_book(book);
            let report = Materializer::new(&store, &store, &config).run(owner_id, today)?;
            save_book_to_path(&store.to_book(owner_id)?, &path)?;
            output::write_materialized(out, &report, &config)?;
        }
        Command::Check { book } => {
            let book = load_book_from_path(&book)?;
            let warnings = book_warnings(&book);
            if warnings.is_empty() {
                writeln!(out, "No issues found.")?;
            }
            for warning in warnings {
                writeln!(out, "warning: {warning}")?;
            }
        }
        Command::Version => {
            writeln!(out, "{}", build_info::current().summary())?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let manager = match path {
        Some(path) => ConfigManager::new(path.to_path_buf()),
        None => ConfigManager::at_default_location(),
    };
    manager.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::ledger::{EntryKind, Frequency, Money, RecurringRule, RuleDraft};
    use crate::storage::Book;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_book(dir: &Path) -> PathBuf {
        let owner = Uuid::new_v4();
        let mut book = Book::new(owner);
        book.rules.push(
            RecurringRule::create(
                owner,
                RuleDraft::new(
                    EntryKind::Expense,
                    Money::from_minor(1_599),
                    Frequency::Monthly,
                    date(2025, 1, 9),
                )
                .with_category("Streaming"),
            )
            .unwrap(),
        );
        let path = dir.join("book.json");
        save_book_to_path(&book, &path).unwrap();
        path
    }

    fn invoke(args: &[&str], clock: &dyn Clock) -> String {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        run(cli, clock, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn upcoming_defaults_to_clock_today() {
        let dir = tempdir().unwrap();
        let book = write_book(dir.path());
        let config = dir.path().join("config.json");
        let text = invoke(
            &[
                "recurring_core_cli",
                "upcoming",
                "--book",
                book.to_str().unwrap(),
                "--config",
                config.to_str().unwrap(),
            ],
            &FixedClock(date(2025, 3, 1)),
        );
        assert!(text.contains("2025-03-09"), "{text}");
        assert!(!text.contains("2025-04-09"), "{text}");
    }

    #[test]
    fn materialize_persists_transactions() {
        let dir = tempdir().unwrap();
        let book = write_book(dir.path());
        let config = dir.path().join("config.json");
        invoke(
            &[
                "recurring_core_cli",
                "materialize",
                "--book",
                book.to_str().unwrap(),
                "--today",
                "2025-02-10",
                "--config",
                config.to_str().unwrap(),
            ],
            &SystemClock,
        );
        let saved = load_book_from_path(&book).unwrap();
        assert_eq!(saved.transactions.len(), 2);
        assert_eq!(saved.rules[0].next_occurrence, Some(date(2025, 3, 9)));
    }

    #[test]
    fn reversed_report_window_is_rejected() {
        let dir = tempdir().unwrap();
        let book = write_book(dir.path());
        let cli = Cli::try_parse_from([
            "recurring_core_cli",
            "report",
            "--book",
            book.to_str().unwrap(),
            "--from",
            "2025-03-01",
            "--to",
            "2025-01-01",
            "--config",
            dir.path().join("config.json").to_str().unwrap(),
        ])
        .unwrap();
        let err = run(cli, &SystemClock, &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Validation(ValidationError::InvalidWindow { .. })
        ));
    }
}
