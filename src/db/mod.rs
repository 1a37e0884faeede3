use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobState};

pub mod queries;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Durable job records. Only the orchestrator writes through this trait.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn insert(&self, record: &JobRecord) -> Result<(), RecordError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, RecordError>;

    /// Move a `processing` record to a terminal state.
    ///
    /// Returns `false` without writing when the record is already terminal.
    async fn finalize(
        &self,
        job_id: Uuid,
        state: &JobState,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RecordError>;

    /// Newest first.
    async fn list_for_owner(&self, owner_id: &str, limit: i64)
        -> Result<Vec<JobRecord>, RecordError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt job record {0}: {1}")]
    Corrupt(Uuid, String),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}
