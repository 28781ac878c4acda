//! Postgres-backed job store.
//!
//! Records are stored as `jsonb` documents in a single table keyed by
//! `(collection, id)`:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS job_records (
//!     collection  TEXT        NOT NULL,
//!     id          TEXT        NOT NULL,
//!     record      JSONB       NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! `set` is an upsert. The timestamp columns mirror the document and exist for
//! ordering and operator queries only; the document is authoritative.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use titledoc_core::{JobId, JobRecord};

use super::{JobStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_records (
    collection  TEXT        NOT NULL,
    id          TEXT        NOT NULL,
    record      JSONB       NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (collection, id)
)
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the backing table if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get(&self, collection: &str, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query("SELECT record FROM job_records WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|row| decode(row.try_get("record"))).transpose()
    }

    #[instrument(skip(self, record), fields(job_id = %id, status = %record.status), err)]
    async fn set(&self, collection: &str, id: &JobId, record: &JobRecord) -> Result<(), StoreError> {
        let document =
            serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO job_records (collection, id, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (collection, id)
            DO UPDATE SET record = EXCLUDED.record, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(collection)
        .bind(id.as_str())
        .bind(document)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set", e))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list(&self, collection: &str) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT record FROM job_records WHERE collection = $1 ORDER BY created_at ASC",
        )
        .bind(collection)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        rows.into_iter()
            .map(|row| decode(row.try_get("record")))
            .collect()
    }
}

fn decode(column: Result<serde_json::Value, sqlx::Error>) -> Result<JobRecord, StoreError> {
    let value = column.map_err(|e| map_sqlx_error("decode", e))?;
    serde_json::from_value(value)
        .map_err(|e| StoreError::Serialization(format!("failed to deserialize job record: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Storage(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("failed to decode row in {operation}: {err}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
