use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// Direction of money flow for a rule or ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        };
        f.pad(label)
    }
}

/// A real, recorded ledger entry.
///
/// `source_rule_id` is set when the entry was materialized from a recurring rule;
/// together with `date` it identifies which occurrence it stands for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rule_id: Option<Uuid>,
}

impl LedgerTransaction {
    pub fn new(
        owner_id: Uuid,
        kind: EntryKind,
        amount: Money,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind,
            amount,
            category: category.into(),
            description: String::new(),
            date,
            source_rule_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source_rule(mut self, rule_id: Uuid) -> Self {
        self.source_rule_id = Some(rule_id);
        self
    }

    /// The `(rule, date)` pair this entry materialized, if any.
    pub fn materialized_occurrence(&self) -> Option<(Uuid, NaiveDate)> {
        self.source_rule_id.map(|rule_id| (rule_id, self.date))
    }
}
