use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::{JobRecordStore, RecordError};
use crate::models::job::{JobRecord, JobState, JobStatus};

const JOB_COLUMNS: &str =
    "id, owner_id, source_image_ref, status, result, error, created_at, completed_at";

/// Postgres-backed job records.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &PgRow) -> Result<JobRecord, RecordError> {
    let job_id: Uuid = row.try_get("id")?;
    let status_str: String = row.try_get("status")?;
    let status: JobStatus = status_str
        .parse()
        .map_err(|_| RecordError::Corrupt(job_id, format!("unknown status '{}'", status_str)))?;
    let result: Option<serde_json::Value> = row.try_get("result")?;
    let error: Option<serde_json::Value> = row.try_get("error")?;

    let state = match (status, result, error) {
        (JobStatus::Processing, None, None) => JobState::Processing,
        (JobStatus::Completed, Some(result), None) => JobState::Completed {
            result: serde_json::from_value(result)?,
        },
        (JobStatus::Failed, None, Some(error)) => JobState::Failed {
            error: serde_json::from_value(error)?,
        },
        (status, result, error) => {
            return Err(RecordError::Corrupt(
                job_id,
                format!(
                    "status {} with result={} error={}",
                    status,
                    result.is_some(),
                    error.is_some()
                ),
            ))
        }
    };

    Ok(JobRecord {
        job_id,
        owner_id: row.try_get("owner_id")?,
        source_image_ref: row.try_get("source_image_ref")?,
        state,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl JobRecordStore for PgJobStore {
    async fn insert(&self, record: &JobRecord) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            INSERT INTO explain_jobs (id, owner_id, source_image_ref, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.job_id)
        .bind(&record.owner_id)
        .bind(&record.source_image_ref)
        .bind(record.state.status().to_string())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, RecordError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM explain_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn finalize(
        &self,
        job_id: Uuid,
        state: &JobState,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RecordError> {
        let (result, error) = match state {
            JobState::Processing => {
                return Err(RecordError::Corrupt(
                    job_id,
                    "finalize called with non-terminal state".to_string(),
                ))
            }
            JobState::Completed { result } => (Some(serde_json::to_value(result)?), None),
            JobState::Failed { error } => (None, Some(serde_json::to_value(error)?)),
        };

        // Single conditional write: concurrent reconcilers cannot overwrite a
        // terminal record.
        let outcome = sqlx::query(
            r#"
            UPDATE explain_jobs
            SET status = $2,
                result = $3,
                error = $4,
                completed_at = $5
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(state.status().to_string())
        .bind(result)
        .bind(error)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<JobRecord>, RecordError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM explain_jobs WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2",
            JOB_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}
