pub mod analytics_service;
pub mod merge_service;
pub mod rule_service;
pub mod summary_service;

pub use analytics_service::{AnalyticsService, DashboardReport};
pub use merge_service::{LedgerEntry, MergeService};
pub use rule_service::RuleService;
pub use summary_service::{AnalyticsSummary, CategoryBucket, MonthKey, MonthlyBucket, SummaryService};

use crate::errors::{StorageError, TransitionError, ValidationError};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
