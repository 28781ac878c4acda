//! Durable job store boundary.
//!
//! Records are kept in named collections and addressed by `JobId`. The store
//! offers plain `get`/`set`: there is no compare-and-swap and no lock held
//! across a caller's read-modify-write, so two writers racing on the same job
//! resolve as last-write-wins.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use titledoc_core::{JobId, JobRecord};

pub use in_memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;

/// Collection holding every job record.
pub const JOBS: &str = "jobs";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend failed (connection, query, poisoned lock, ...).
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Keyed persistence for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, collection: &str, id: &JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Insert or replace the record stored under `id`.
    async fn set(&self, collection: &str, id: &JobId, record: &JobRecord) -> Result<(), StoreError>;

    /// Every record of a collection, oldest first.
    async fn list(&self, collection: &str) -> Result<Vec<JobRecord>, StoreError>;
}

#[async_trait]
impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    async fn get(&self, collection: &str, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        (**self).get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &JobId, record: &JobRecord) -> Result<(), StoreError> {
        (**self).set(collection, id, record).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<JobRecord>, StoreError> {
        (**self).list(collection).await
    }
}
