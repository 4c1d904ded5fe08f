use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use freightdesk_core::domain::call::{CallId, CallOutcome, CallRecord};
use freightdesk_core::stats::CallStats;

pub mod call_log;
pub mod memory;

pub use call_log::SqlCallRecordRepository;
pub use memory::InMemoryCallRecordRepository;

pub const DEFAULT_LIST_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Selection for call-log queries. Bounds are inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallLogFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub outcome: Option<CallOutcome>,
    pub limit: Option<u32>,
}

impl CallLogFilter {
    pub fn with_limit(limit: u32) -> Self {
        Self { limit: Some(limit), ..Self::default() }
    }

    pub fn matches(&self, record: &CallRecord) -> bool {
        self.start.map_or(true, |start| record.timestamp >= start)
            && self.end.map_or(true, |end| record.timestamp <= end)
            && self.outcome.map_or(true, |outcome| record.outcome == outcome)
    }

    /// Same window without outcome or limit; statistics cover every outcome.
    pub fn window(&self) -> Self {
        Self { start: self.start, end: self.end, outcome: None, limit: None }
    }
}

#[async_trait]
pub trait CallRecordRepository: Send + Sync {
    async fn save(&self, record: CallRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &CallId) -> Result<Option<CallRecord>, RepositoryError>;

    /// Newest first.
    async fn list(&self, filter: &CallLogFilter) -> Result<Vec<CallRecord>, RepositoryError>;

    async fn stats(&self, filter: &CallLogFilter) -> Result<CallStats, RepositoryError> {
        let records = self.list(&filter.window()).await?;
        Ok(CallStats::from_records(&records))
    }

    /// Removes every record; returns how many were deleted.
    async fn clear(&self) -> Result<u64, RepositoryError>;
}
