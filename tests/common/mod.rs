#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use recurring_core::{
    ledger::{EntryKind, Frequency, LedgerTransaction, Money, RecurringRule, RuleDraft},
    storage::{save_book_to_path, Book},
};
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates an isolated directory that outlives the calling test.
pub fn temp_base() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn monthly(
    owner: Uuid,
    kind: EntryKind,
    minor: i64,
    start: NaiveDate,
    category: &str,
) -> RecurringRule {
    RecurringRule::create(
        owner,
        RuleDraft::new(kind, Money::from_minor(minor), Frequency::Monthly, start)
            .with_category(category),
    )
    .expect("valid monthly rule")
}

/// Salary, rent and a streaming subscription starting January 2025, with the
/// January rent already materialized.
pub fn household_book() -> Book {
    let owner = Uuid::new_v4();
    let salary = monthly(owner, EntryKind::Income, 300_000, date(2025, 1, 1), "Salary");
    let mut rent = monthly(owner, EntryKind::Expense, 120_000, date(2025, 1, 3), "Rent");
    let paid = date(2025, 1, 3);
    let next = rent.following(paid).expect("valid rent schedule");
    rent.record_materialization(paid, next);
    let streaming = RecurringRule::create(
        owner,
        RuleDraft::new(
            EntryKind::Expense,
            Money::from_minor(1_599),
            Frequency::Monthly,
            date(2025, 1, 31),
        )
        .with_description("Video streaming"),
    )
    .expect("valid streaming rule");

    let mut book = Book::new(owner);
    book.transactions.push(
        LedgerTransaction::new(owner, EntryKind::Expense, rent.amount, "Rent", paid)
            .with_source_rule(rent.id),
    );
    book.rules = vec![salary, rent, streaming];
    book
}

/// Writes `book` into a fresh temp dir and returns the file path.
pub fn write_book(book: &Book) -> PathBuf {
    let path = temp_base().join("book.json");
    save_book_to_path(book, &path).expect("save book");
    path
}
