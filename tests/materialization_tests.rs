mod common;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::NaiveDate;
use recurring_core::{
    config::EngineConfig,
    core::{services::RuleService, Materializer},
    errors::StorageError,
    ledger::{
        DateWindow, EntryKind, Frequency, LedgerTransaction, Money, NextOccurrence,
        RecurringRule, RuleDraft, RuleState,
    },
    storage::{LedgerStore, MemoryStore, RuleStore},
};
use uuid::Uuid;

use common::{date, monthly};

#[test]
fn stale_cursor_is_rejected_without_side_effects() {
    let store = MemoryStore::new();
    let rule = monthly(Uuid::new_v4(), EntryKind::Income, 10_000, date(2025, 1, 15), "Allowance");
    store.save_rule(&rule).unwrap();

    let advanced = store
        .advance_cursor(
            rule.id,
            Some(date(2025, 1, 15)),
            date(2025, 1, 15),
            NextOccurrence::On(date(2025, 2, 15)),
        )
        .unwrap();
    assert_eq!(advanced.state, RuleState::Active);

    let err = store
        .advance_cursor(
            rule.id,
            Some(date(2025, 1, 15)),
            date(2025, 1, 15),
            NextOccurrence::On(date(2025, 2, 15)),
        )
        .unwrap_err();
    match err {
        StorageError::ConcurrencyConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, Some(date(2025, 1, 15)));
            assert_eq!(actual, Some(date(2025, 2, 15)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.load_rule(rule.id).unwrap(), advanced);
}

#[test]
fn paused_rule_cursor_cannot_advance() {
    let store = MemoryStore::new();
    let rule = monthly(Uuid::new_v4(), EntryKind::Expense, 999, date(2025, 1, 1), "News");
    store.save_rule(&rule).unwrap();
    RuleService::toggle(&store, rule.id, date(2025, 1, 1)).unwrap();

    let err = store
        .advance_cursor(
            rule.id,
            Some(date(2025, 1, 1)),
            date(2025, 1, 1),
            NextOccurrence::On(date(2025, 2, 1)),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::ConcurrencyConflict { .. }));
}

#[test]
fn concurrent_jobs_create_each_occurrence_once() {
    let store = Arc::new(MemoryStore::new());
    let owner = Uuid::new_v4();
    for start in [date(2025, 1, 1), date(2025, 1, 2), date(2025, 1, 3)] {
        RuleService::create(
            store.as_ref(),
            owner,
            RuleDraft::new(EntryKind::Expense, Money::from_minor(250), Frequency::Weekly, start),
        )
        .unwrap();
    }
    let today = date(2025, 3, 31);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                Materializer::new(store.as_ref(), store.as_ref(), &EngineConfig::default())
                    .run(owner, today)
                    .unwrap()
            })
        })
        .collect();
    let created: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().created.len())
        .sum();

    let window = DateWindow::new(date(2025, 1, 1), today).unwrap();
    let stored = store.transactions_between(owner, window).unwrap();
    // 13 weekly occurrences per rule through the end of March.
    assert_eq!(stored.len(), 39);
    assert_eq!(created, 39);
}

#[test]
fn materialized_transaction_copies_rule_fields() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let rule = RuleService::create(
        &store,
        owner,
        RuleDraft::new(
            EntryKind::Income,
            Money::from_minor(250_000),
            Frequency::Monthly,
            date(2025, 1, 25),
        )
        .with_category("Salary")
        .with_description("Acme payroll"),
    )
    .unwrap();

    let report = Materializer::new(&store, &store, &EngineConfig::default())
        .run(owner, date(2025, 1, 25))
        .unwrap();
    let txn = &report.created[0];
    assert_eq!(txn.owner_id, owner);
    assert_eq!(txn.kind, EntryKind::Income);
    assert_eq!(txn.amount, rule.amount);
    assert_eq!(txn.category, "Salary");
    assert_eq!(txn.description, "Acme payroll");
    assert_eq!(txn.materialized_occurrence(), Some((rule.id, date(2025, 1, 25))));
}

/// Store that runs one materialization pass right after the first rule read,
/// so the caller's copy is stale by the time it writes back.
struct RacingStore {
    inner: MemoryStore,
    owner: Uuid,
    today: NaiveDate,
    raced: AtomicBool,
}

impl RuleStore for RacingStore {
    fn rules_for_owner(&self, owner_id: Uuid) -> recurring_core::storage::Result<Vec<RecurringRule>> {
        self.inner.rules_for_owner(owner_id)
    }

    fn load_rule(&self, rule_id: Uuid) -> recurring_core::storage::Result<RecurringRule> {
        let rule = self.inner.load_rule(rule_id)?;
        if !self.raced.swap(true, Ordering::SeqCst) {
            Materializer::new(&self.inner, &self.inner, &EngineConfig::default())
                .run(self.owner, self.today)
                .expect("racing materialization");
        }
        Ok(rule)
    }

    fn save_rule(&self, rule: &RecurringRule) -> recurring_core::storage::Result<()> {
        self.inner.save_rule(rule)
    }

    fn replace_rule(
        &self,
        current: &RecurringRule,
        updated: &RecurringRule,
    ) -> recurring_core::storage::Result<()> {
        self.inner.replace_rule(current, updated)
    }

    fn delete_rule(&self, rule_id: Uuid) -> recurring_core::storage::Result<RecurringRule> {
        self.inner.delete_rule(rule_id)
    }

    fn advance_cursor(
        &self,
        rule_id: Uuid,
        expected: Option<NaiveDate>,
        materialized: NaiveDate,
        next: NextOccurrence,
    ) -> recurring_core::storage::Result<RecurringRule> {
        self.inner.advance_cursor(rule_id, expected, materialized, next)
    }
}

fn occurrences_of(store: &MemoryStore, owner: Uuid, rule_id: Uuid, on: NaiveDate) -> usize {
    let window = DateWindow::new(on, on).unwrap();
    store
        .transactions_between(owner, window)
        .unwrap()
        .iter()
        .filter(|txn: &&LedgerTransaction| txn.materialized_occurrence() == Some((rule_id, on)))
        .count()
}

#[test]
fn toggle_racing_a_materializer_keeps_the_advanced_cursor() {
    let owner = Uuid::new_v4();
    let today = date(2025, 1, 10);
    let store = RacingStore {
        inner: MemoryStore::new(),
        owner,
        today,
        raced: AtomicBool::new(false),
    };
    let gym = monthly(owner, EntryKind::Expense, 4_500, today, "Health");
    store.save_rule(&gym).unwrap();

    let paused = RuleService::toggle(&store, gym.id, today).unwrap();
    assert_eq!(paused.state, RuleState::Paused);
    assert_eq!(paused.last_materialized, Some(today));
    assert_eq!(paused.next_occurrence, Some(date(2025, 2, 10)));

    let resumed = RuleService::toggle(&store, gym.id, today).unwrap();
    assert_eq!(resumed.state, RuleState::Active);
    assert_eq!(resumed.next_occurrence, Some(date(2025, 2, 10)));

    let again = Materializer::new(&store.inner, &store.inner, &EngineConfig::default())
        .run(owner, today)
        .unwrap();
    assert!(again.created.is_empty());
    assert_eq!(occurrences_of(&store.inner, owner, gym.id, today), 1);
}

#[test]
fn update_racing_a_materializer_reapplies_the_patch() {
    let owner = Uuid::new_v4();
    let today = date(2025, 3, 1);
    let store = RacingStore {
        inner: MemoryStore::new(),
        owner,
        today,
        raced: AtomicBool::new(false),
    };
    let rent = monthly(owner, EntryKind::Expense, 120_000, date(2025, 1, 1), "Rent");
    store.save_rule(&rent).unwrap();

    let patch = recurring_core::ledger::RulePatch {
        amount: Some(Money::from_minor(125_000)),
        ..Default::default()
    };
    let updated = RuleService::update(&store, rent.id, patch).unwrap();
    assert_eq!(updated.amount, Money::from_minor(125_000));
    assert_eq!(updated.last_materialized, Some(date(2025, 3, 1)));
    assert_eq!(updated.next_occurrence, Some(date(2025, 4, 1)));
    assert_eq!(store.inner.transaction_count().unwrap(), 3);
}

#[test]
fn malformed_rule_does_not_block_the_others() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let good = monthly(owner, EntryKind::Income, 50_000, date(2025, 1, 1), "Salary");
    let mut broken = monthly(owner, EntryKind::Expense, 999, date(2025, 1, 1), "News");
    broken.interval = 0;
    store.save_rule(&good).unwrap();
    store.save_rule(&broken).unwrap();

    let report = Materializer::new(&store, &store, &EngineConfig::default())
        .run(owner, date(2025, 3, 1))
        .unwrap();
    assert_eq!(report.skipped, vec![broken.id]);
    assert_eq!(report.created.len(), 3);
    assert!(report
        .created
        .iter()
        .all(|txn| txn.source_rule_id == Some(good.id)));
    assert_eq!(store.load_rule(broken.id).unwrap().next_occurrence, Some(date(2025, 1, 1)));
}
