//! Store abstractions consumed by the services, plus an in-memory implementation
//! and a JSON snapshot format.

pub mod json_backend;
pub mod memory;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    errors::StorageError,
    ledger::{DateWindow, LedgerTransaction, NextOccurrence, RecurringRule},
};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Source of truth for recurring rules and their cursors.
pub trait RuleStore: Send + Sync {
    fn rules_for_owner(&self, owner_id: Uuid) -> Result<Vec<RecurringRule>>;
    fn load_rule(&self, rule_id: Uuid) -> Result<RecurringRule>;
    /// Inserts or replaces the rule with the same id.
    fn save_rule(&self, rule: &RecurringRule) -> Result<()>;
    /// Swaps in `updated` only while the stored rule still equals `current`, the
    /// copy the change was computed from. A rule that moved in between (most
    /// often a cursor advance) fails with [`StorageError::ConcurrencyConflict`].
    fn replace_rule(&self, current: &RecurringRule, updated: &RecurringRule) -> Result<()>;
    fn delete_rule(&self, rule_id: Uuid) -> Result<RecurringRule>;

    /// Atomically records that the occurrence on `materialized` was turned into a
    /// real transaction and moves the cursor to `next`.
    ///
    /// Succeeds only while the stored cursor still equals `expected` and the
    /// rule is still projectable; otherwise fails with
    /// [`StorageError::ConcurrencyConflict`] and leaves the rule untouched.
    fn advance_cursor(
        &self,
        rule_id: Uuid,
        expected: Option<NaiveDate>,
        materialized: NaiveDate,
        next: NextOccurrence,
    ) -> Result<RecurringRule>;
}

/// Store of real, recorded transactions.
pub trait LedgerStore: Send + Sync {
    /// Transactions for `owner_id` dated inside `window`, ordered by date.
    fn transactions_between(
        &self,
        owner_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<LedgerTransaction>>;
    fn append(&self, transaction: LedgerTransaction) -> Result<()>;
}

pub use json_backend::{
    book_warnings, load_book_from_path, save_book_to_path, Book, BOOK_SCHEMA_VERSION,
};
pub use memory::MemoryStore;
