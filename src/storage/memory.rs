use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::NaiveDate;
use uuid::Uuid;

use super::{json_backend::Book, LedgerStore, Result, RuleStore};
use crate::{
    errors::StorageError,
    ledger::{DateWindow, LedgerTransaction, NextOccurrence, RecurringRule},
};

/// Thread-safe in-process store for rules and ledger transactions.
///
/// Cursor advances happen under the rules write lock, which makes the
/// compare-and-set in [`RuleStore::advance_cursor`] atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: RwLock<HashMap<Uuid, RecurringRule>>,
    transactions: RwLock<Vec<LedgerTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_book(book: Book) -> Self {
        let rules = book.rules.into_iter().map(|rule| (rule.id, rule)).collect();
        Self {
            rules: RwLock::new(rules),
            transactions: RwLock::new(book.transactions),
        }
    }

    /// Snapshot of everything stored for `owner_id`.
    pub fn to_book(&self, owner_id: Uuid) -> Result<Book> {
        let mut book = Book::new(owner_id);
        book.rules = self.rules_for_owner(owner_id)?;
        book.transactions = self
            .read_transactions()?
            .iter()
            .filter(|txn| txn.owner_id == owner_id)
            .cloned()
            .collect();
        sort_transactions(&mut book.transactions);
        Ok(book)
    }

    pub fn transaction_count(&self) -> Result<usize> {
        Ok(self.read_transactions()?.len())
    }

    fn read_rules(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, RecurringRule>>> {
        self.rules.read().map_err(|_| StorageError::Poisoned)
    }

    fn write_rules(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, RecurringRule>>> {
        self.rules.write().map_err(|_| StorageError::Poisoned)
    }

    fn read_transactions(&self) -> Result<RwLockReadGuard<'_, Vec<LedgerTransaction>>> {
        self.transactions.read().map_err(|_| StorageError::Poisoned)
    }
}

impl RuleStore for MemoryStore {
    fn rules_for_owner(&self, owner_id: Uuid) -> Result<Vec<RecurringRule>> {
        let mut rules: Vec<_> = self
            .read_rules()?
            .values()
            .filter(|rule| rule.owner_id == owner_id)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| (rule.start_date, rule.id));
        Ok(rules)
    }

    fn load_rule(&self, rule_id: Uuid) -> Result<RecurringRule> {
        self.read_rules()?
            .get(&rule_id)
            .cloned()
            .ok_or(StorageError::RuleNotFound(rule_id))
    }

    fn save_rule(&self, rule: &RecurringRule) -> Result<()> {
        self.write_rules()?.insert(rule.id, rule.clone());
        Ok(())
    }

    fn replace_rule(&self, current: &RecurringRule, updated: &RecurringRule) -> Result<()> {
        let mut rules = self.write_rules()?;
        let stored = rules
            .get_mut(&current.id)
            .ok_or(StorageError::RuleNotFound(current.id))?;
        if stored != current {
            return Err(StorageError::ConcurrencyConflict {
                rule_id: current.id,
                expected: current.next_occurrence,
                actual: stored.next_occurrence,
            });
        }
        *stored = updated.clone();
        Ok(())
    }

    fn delete_rule(&self, rule_id: Uuid) -> Result<RecurringRule> {
        self.write_rules()?
            .remove(&rule_id)
            .ok_or(StorageError::RuleNotFound(rule_id))
    }

    fn advance_cursor(
        &self,
        rule_id: Uuid,
        expected: Option<NaiveDate>,
        materialized: NaiveDate,
        next: NextOccurrence,
    ) -> Result<RecurringRule> {
        let mut rules = self.write_rules()?;
        let rule = rules
            .get_mut(&rule_id)
            .ok_or(StorageError::RuleNotFound(rule_id))?;
        if rule.next_occurrence != expected || !rule.state.is_projectable() {
            return Err(StorageError::ConcurrencyConflict {
                rule_id,
                expected,
                actual: rule.next_occurrence,
            });
        }
        rule.record_materialization(materialized, next);
        Ok(rule.clone())
    }
}

impl LedgerStore for MemoryStore {
    fn transactions_between(
        &self,
        owner_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<LedgerTransaction>> {
        let mut found: Vec<_> = self
            .read_transactions()?
            .iter()
            .filter(|txn| txn.owner_id == owner_id && window.contains(txn.date))
            .cloned()
            .collect();
        sort_transactions(&mut found);
        Ok(found)
    }

    fn append(&self, transaction: LedgerTransaction) -> Result<()> {
        self.transactions
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .push(transaction);
        Ok(())
    }
}

fn sort_transactions(transactions: &mut [LedgerTransaction]) {
    transactions.sort_by_key(|txn| (txn.date, txn.id));
}
