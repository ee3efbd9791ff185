use std::{
    collections::HashSet,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Result;
use crate::ledger::{LedgerTransaction, RecurringRule, RuleState};

pub const BOOK_SCHEMA_VERSION: u8 = 1;
const TMP_SUFFIX: &str = "tmp";

/// Serializable snapshot of one owner's rules and ledger transactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    #[serde(default = "Book::schema_version_default")]
    pub schema_version: u8,
    pub owner_id: Uuid,
    #[serde(default)]
    pub rules: Vec<RecurringRule>,
    #[serde(default)]
    pub transactions: Vec<LedgerTransaction>,
}

impl Book {
    pub fn new(owner_id: Uuid) -> Self {
        Self {
            schema_version: BOOK_SCHEMA_VERSION,
            owner_id,
            rules: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn schema_version_default() -> u8 {
        BOOK_SCHEMA_VERSION
    }
}

/// Writes `book` as pretty JSON via a temporary file renamed into place.
pub fn save_book_to_path(book: &Book, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(book)?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_book_from_path(path: &Path) -> Result<Book> {
    let data = fs::read_to_string(path)?;
    let book: Book = serde_json::from_str(&data)?;
    Ok(book)
}

/// Detects dangling references and cursor anomalies within a snapshot.
pub fn book_warnings(book: &Book) -> Vec<String> {
    let rule_ids: HashSet<_> = book.rules.iter().map(|rule| rule.id).collect();
    let mut warnings = Vec::new();

    for rule in &book.rules {
        if let Err(err) = rule.validate() {
            warnings.push(format!("rule {} is malformed: {}", rule.id, err));
        }
        if rule.owner_id != book.owner_id {
            warnings.push(format!(
                "rule {} belongs to owner {} not {}",
                rule.id, rule.owner_id, book.owner_id
            ));
        }
        if rule.state != RuleState::Exhausted && rule.next_occurrence.is_none() {
            warnings.push(format!("rule {} is {} with no next date", rule.id, rule.state));
        }
        if let (Some(next), Some(last)) = (rule.next_occurrence, rule.last_materialized) {
            if next < last {
                warnings.push(format!(
                    "rule {} cursor {} precedes last materialization {}",
                    rule.id, next, last
                ));
            }
        }
    }

    for txn in &book.transactions {
        if let Some(rule_id) = txn.source_rule_id {
            if !rule_ids.contains(&rule_id) {
                warnings.push(format!(
                    "transaction {} references unknown rule {}",
                    txn.id, rule_id
                ));
            }
        }
    }
    warnings
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{EntryKind, Frequency, Money, RuleDraft};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_book() -> Book {
        let owner = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        let rule = RecurringRule::create(
            owner,
            RuleDraft::new(
                EntryKind::Income,
                Money::from_minor(120_055),
                Frequency::Monthly,
                start,
            )
            .with_category("Salary"),
        )
        .unwrap();
        let mut book = Book::new(owner);
        book.transactions.push(
            LedgerTransaction::new(owner, EntryKind::Income, rule.amount, "Salary", start)
                .with_source_rule(rule.id),
        );
        book.rules.push(rule);
        book
    }

    #[test]
    fn save_then_load_preserves_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("book.json");
        let book = sample_book();
        save_book_to_path(&book, &path).unwrap();
        assert!(!tmp_path(&path).exists());
        let loaded = load_book_from_path(&path).unwrap();
        assert_eq!(loaded, book);
    }

    #[test]
    fn warnings_flag_malformed_rule() {
        let mut book = sample_book();
        book.rules[0].interval = 0;
        let warnings = book_warnings(&book);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("malformed"), "{}", warnings[0]);
    }

    #[test]
    fn warnings_flag_unknown_rule_reference() {
        let mut book = sample_book();
        assert!(book_warnings(&book).is_empty());
        book.rules.clear();
        let warnings = book_warnings(&book);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unknown rule"));
    }
}
