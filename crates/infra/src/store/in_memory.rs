//! In-memory job store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use titledoc_core::{JobId, JobRecord};

use super::{JobStore, StoreError};

type Key = (String, JobId);

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<Key, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of records across all collections.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("job store lock poisoned".to_string())
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, collection: &str, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(&(collection.to_string(), id.clone())).cloned())
    }

    async fn set(&self, collection: &str, id: &JobId, record: &JobRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert((collection.to_string(), id.clone()), record.clone());
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<JobRecord>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut out: Vec<JobRecord> = records
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|(_, r)| r.clone())
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::JOBS;

    fn record(id: &str) -> JobRecord {
        JobRecord::queued(JobId::parse(id).unwrap(), "UCabc", "a@b.com", Utc::now())
    }

    #[tokio::test]
    async fn set_then_get_returns_the_record() {
        let store = InMemoryJobStore::new();
        let r = record("job-1");
        store.set(JOBS, &r.job_id, &r).await.unwrap();

        assert_eq!(store.get(JOBS, &r.job_id).await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let store = InMemoryJobStore::new();
        let id = JobId::parse("job-404").unwrap();
        assert_eq!(store.get(JOBS, &id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryJobStore::new();
        let r = record("job-1");
        store.set("archive", &r.job_id, &r).await.unwrap();

        assert_eq!(store.get(JOBS, &r.job_id).await.unwrap(), None);
        assert!(store.list(JOBS).await.unwrap().is_empty());
        assert_eq!(store.list("archive").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_replaces_the_whole_record() {
        let store = InMemoryJobStore::new();
        let mut r = record("job-1");
        store.set(JOBS, &r.job_id, &r).await.unwrap();

        r.channel_id = Some("UCabc".to_string());
        store.set(JOBS, &r.job_id, &r).await.unwrap();

        let stored = store.get(JOBS, &r.job_id).await.unwrap().unwrap();
        assert_eq!(stored.channel_id.as_deref(), Some("UCabc"));
        assert_eq!(store.len(), 1);
    }
}
