use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{JobRecordStore, RecordError};
use crate::models::artifact::{artifact_path, is_valid_owner_id, ArtifactKind};
use crate::models::job::{
    record_timestamp, DispatchPayload, ErrorKind, ErrorPayload, JobRecord, JobRequestArtifact,
    JobState, JobStatus,
};
use crate::services::queue::Dispatcher;
use crate::services::storage::{ArtifactProbe, ArtifactStore, StorageError};

/// Upper bound on history listings.
pub const MAX_HISTORY: i64 = 50;

/// Creates explainability jobs and reconciles their records with the
/// Artifact Store on demand.
///
/// The orchestrator is the only writer of job records. Workers only write
/// artifacts; `reconcile` copies their outcome into the record.
pub struct Orchestrator {
    artifacts: Arc<dyn ArtifactStore>,
    records: Arc<dyn JobRecordStore>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Orchestrator {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        records: Arc<dyn JobRecordStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            artifacts,
            records,
            dispatcher,
        }
    }

    /// Start a job and return its id without waiting for the worker.
    ///
    /// Side effects, in order: one `request` artifact write, one dispatch, one
    /// record insert. A failing step aborts submission and nothing is returned
    /// to the caller.
    pub async fn submit(
        &self,
        owner_id: &str,
        source_image_ref: &str,
    ) -> Result<Uuid, OrchestratorError> {
        if !is_valid_owner_id(owner_id) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "invalid owner id '{}'",
                owner_id
            )));
        }
        if source_image_ref.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "source image reference is empty".to_string(),
            ));
        }

        let job_id = Uuid::new_v4();
        let request = JobRequestArtifact {
            job_id,
            owner_id: owner_id.to_string(),
            source_image_ref: source_image_ref.to_string(),
            status: JobStatus::Submitted,
            submitted_at: Utc::now(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| OrchestratorError::SubmissionFailure(e.to_string()))?;

        let path = artifact_path(owner_id, job_id, &ArtifactKind::Request);
        self.artifacts
            .put(&path, &body, "application/json")
            .await
            .map_err(|e| {
                tracing::error!(job_id = %job_id, path = %path, error = %e, "Request artifact write failed");
                OrchestratorError::SubmissionFailure(format!("request artifact write failed: {}", e))
            })?;

        let payload = DispatchPayload {
            source_image_ref: source_image_ref.to_string(),
            owner_id: owner_id.to_string(),
            job_id,
        };
        self.dispatcher.dispatch(&payload).await.map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Worker dispatch failed");
            OrchestratorError::SubmissionFailure(format!("dispatch failed: {}", e))
        })?;

        let record = JobRecord::new(job_id, owner_id, source_image_ref);
        self.records.insert(&record).await.map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Job record insert failed");
            OrchestratorError::SubmissionFailure(format!("job record insert failed: {}", e))
        })?;

        metrics::counter!("explain_jobs_submitted_total").increment(1);
        tracing::info!(
            job_id = %job_id,
            owner_id = %owner_id,
            source_image_ref = %source_image_ref,
            "Explainability job submitted"
        );

        Ok(job_id)
    }

    /// Bring the job record in line with the Artifact Store and return it.
    ///
    /// Terminal records are returned without touching the Artifact Store.
    /// Storage faults are returned as errors and leave the record untouched,
    /// so the next poll retries from scratch.
    pub async fn reconcile(
        &self,
        job_id: Uuid,
        owner_id: &str,
    ) -> Result<JobRecord, OrchestratorError> {
        let record = self.load(job_id, owner_id).await?;
        if record.state.is_terminal() {
            metrics::counter!("explain_reconcile_total", "status" => record.state.status().to_string())
                .increment(1);
            return Ok(record);
        }

        let Some(state) = self.probe_terminal(job_id, owner_id).await? else {
            tracing::debug!(job_id = %job_id, "No terminal artifact yet");
            metrics::counter!("explain_reconcile_total", "status" => "processing").increment(1);
            return Ok(record);
        };

        let completed_at = record_timestamp();
        let written = self.records.finalize(job_id, &state, completed_at).await?;

        let status = state.status();
        metrics::counter!("explain_reconcile_total", "status" => status.to_string()).increment(1);

        if !written {
            // Another poller finalized the record first; return what it stored.
            tracing::debug!(job_id = %job_id, "Record already finalized by a concurrent reconcile");
            return self.load(job_id, owner_id).await;
        }

        match status {
            JobStatus::Completed => metrics::counter!("explain_jobs_completed_total").increment(1),
            _ => metrics::counter!("explain_jobs_failed_total").increment(1),
        }
        tracing::info!(job_id = %job_id, owner_id = %owner_id, status = %status, "Job reconciled");

        Ok(JobRecord {
            state,
            completed_at: Some(completed_at),
            ..record
        })
    }

    /// Read a record as stored, without reconciling.
    pub async fn get(&self, job_id: Uuid, owner_id: &str) -> Result<JobRecord, OrchestratorError> {
        self.load(job_id, owner_id).await
    }

    /// An owner's most recent jobs, newest first.
    pub async fn history(
        &self,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<JobRecord>, OrchestratorError> {
        self.records
            .list_for_owner(owner_id, limit.clamp(1, MAX_HISTORY))
            .await
            .map_err(OrchestratorError::from)
    }

    async fn load(&self, job_id: Uuid, owner_id: &str) -> Result<JobRecord, OrchestratorError> {
        match self.records.get(job_id).await? {
            Some(record) if record.owner_id == owner_id => Ok(record),
            _ => Err(OrchestratorError::NotFound(job_id)),
        }
    }

    /// Look for the `result` artifact, then the `error` artifact.
    async fn probe_terminal(
        &self,
        job_id: Uuid,
        owner_id: &str,
    ) -> Result<Option<JobState>, OrchestratorError> {
        let result_path = artifact_path(owner_id, job_id, &ArtifactKind::Result);
        match self.artifacts.get(&result_path).await {
            ArtifactProbe::Found(body) => {
                let state = match serde_json::from_slice(&body) {
                    Ok(result) => JobState::Completed { result },
                    Err(e) => corrupt_artifact(job_id, &result_path, e),
                };
                return Ok(Some(state));
            }
            ArtifactProbe::NotFound => {}
            ArtifactProbe::Fault(e) => return Err(storage_fault(job_id, &result_path, e)),
        }

        let error_path = artifact_path(owner_id, job_id, &ArtifactKind::Error);
        match self.artifacts.get(&error_path).await {
            ArtifactProbe::Found(body) => {
                let state = match serde_json::from_slice(&body) {
                    Ok(error) => JobState::Failed { error },
                    Err(e) => corrupt_artifact(job_id, &error_path, e),
                };
                Ok(Some(state))
            }
            ArtifactProbe::NotFound => Ok(None),
            ArtifactProbe::Fault(e) => Err(storage_fault(job_id, &error_path, e)),
        }
    }
}

/// Artifacts are written once, so an unparseable one will never heal.
fn corrupt_artifact(job_id: Uuid, path: &str, e: serde_json::Error) -> JobState {
    tracing::warn!(job_id = %job_id, path = %path, error = %e, "Terminal artifact is not valid JSON");
    JobState::Failed {
        error: ErrorPayload::new(
            ErrorKind::CorruptArtifact,
            format!("artifact {} could not be parsed: {}", path, e),
        ),
    }
}

fn storage_fault(job_id: Uuid, path: &str, e: StorageError) -> OrchestratorError {
    tracing::warn!(job_id = %job_id, path = %path, error = %e, "Artifact probe failed");
    OrchestratorError::StorageFault(format!("artifact {}: {}", path, e))
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Job submission failed: {0}")]
    SubmissionFailure(String),

    #[error("Storage fault: {0}")]
    StorageFault(String),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<RecordError> for OrchestratorError {
    fn from(e: RecordError) -> Self {
        OrchestratorError::StorageFault(format!("job record: {}", e))
    }
}
