use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::analysis::AnalysisResult;

/// Lifecycle status of an explainability job.
///
/// `Submitted` only ever appears in the request artifact; the first durable
/// record state is `Processing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Which step of the worker failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    FetchFailure,
    EngineFailure,
    InvalidInput,
    CorruptArtifact,
}

/// Payload of the `error` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            kind: Some(kind),
        }
    }
}

/// Observable state of a job. Serialized as the reconciliation response:
/// `{"status": "...", "result"?: ..., "error"?: ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Processing,
    Completed { result: AnalysisResult },
    Failed { error: ErrorPayload },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Processing => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Current time at the microsecond precision job records are stored with.
pub fn record_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Durable job record. The Artifact Store is the source of truth for
/// completion; this record caches it once reconciled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub owner_id: String,
    pub source_image_ref: String,
    #[serde(flatten)]
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(job_id: Uuid, owner_id: &str, source_image_ref: &str) -> Self {
        Self {
            job_id,
            owner_id: owner_id.to_string(),
            source_image_ref: source_image_ref.to_string(),
            state: JobState::Processing,
            created_at: record_timestamp(),
            completed_at: None,
        }
    }
}

/// Payload of the `request` artifact, written synchronously at submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRequestArtifact {
    pub job_id: Uuid,
    pub owner_id: String,
    pub source_image_ref: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Message handed to the Async Executor to start a worker run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchPayload {
    pub source_image_ref: String,
    pub owner_id: String,
    pub job_id: Uuid,
}
