use std::collections::HashMap;

use tokio::sync::RwLock;

use freightdesk_core::domain::call::{CallId, CallRecord};

use super::{CallLogFilter, CallRecordRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCallRecordRepository {
    records: RwLock<HashMap<String, CallRecord>>,
}

#[async_trait::async_trait]
impl CallRecordRepository for InMemoryCallRecordRepository {
    async fn save(&self, record: CallRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.call_id.0.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, id: &CallId) -> Result<Option<CallRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&id.0).cloned())
    }

    async fn list(&self, filter: &CallLogFilter) -> Result<Vec<CallRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut selected: Vec<CallRecord> =
            records.values().filter(|record| filter.matches(record)).cloned().collect();
        selected.sort_by(|left, right| {
            right.timestamp.cmp(&left.timestamp).then_with(|| right.call_id.cmp(&left.call_id))
        });
        if let Some(limit) = filter.limit {
            selected.truncate(limit as usize);
        }
        Ok(selected)
    }

    async fn clear(&self) -> Result<u64, RepositoryError> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
