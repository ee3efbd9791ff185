//! Domain values for recurring rules, ledger entries, and calendar arithmetic.

pub mod money;
pub mod recurring;
pub mod rule;
pub mod time_interval;
pub mod transaction;
pub mod window;

pub use money::{Money, DEFAULT_MINOR_DIGITS};
pub use recurring::{
    compute_next_occurrence, project_occurrences, project_occurrences_bounded, NextOccurrence,
    Occurrence, MAX_PROJECTED_OCCURRENCES,
};
pub use rule::{RecurringRule, RuleDraft, RulePatch, RuleState};
pub use time_interval::{Frequency, TimeInterval};
pub use transaction::{EntryKind, LedgerTransaction};
pub use window::DateWindow;
