use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::artifact::is_valid_owner_id;
use crate::models::job::{JobRecord, JobState};

/// Request to start an explainability analysis.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[garde(length(min = 1, max = 128), custom(single_path_segment))]
    pub owner_id: String,

    #[garde(url)]
    pub image_url: String,
}

fn single_path_segment(value: &String, _ctx: &()) -> garde::Result {
    if is_valid_owner_id(value) {
        Ok(())
    } else {
        Err(garde::Error::new("owner_id must be a single path segment"))
    }
}

/// Response after submitting a job.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

/// One entry of an owner's job history.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub source_image_ref: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: JobState,
}

impl From<JobRecord> for JobSummary {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            source_image_ref: record.source_image_ref,
            created_at: record.created_at,
            completed_at: record.completed_at,
            state: record.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = SubmitRequest {
            owner_id: "u1".to_string(),
            image_url: "https://x/img.png".to_string(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rejects_owner_with_slash_and_bad_url() {
        let req = SubmitRequest {
            owner_id: "u1/../u2".to_string(),
            image_url: "https://x/img.png".to_string(),
        };
        assert!(req.validate().is_err());

        let req = SubmitRequest {
            owner_id: "u1".to_string(),
            image_url: "not a url".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
