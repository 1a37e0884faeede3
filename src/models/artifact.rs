use uuid::Uuid;

/// Kinds of blobs a job may own under its artifact prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    Request,
    Result,
    Error,
    /// Rendered visualization, stored under `images/{name}`.
    Image(String),
}

/// Root path shared by every artifact of one job: `jobs/{owner_id}/{job_id}/`.
pub fn job_prefix(owner_id: &str, job_id: Uuid) -> String {
    format!("jobs/{}/{}/", owner_id, job_id)
}

/// Canonical Artifact Store path for one artifact of a job.
pub fn artifact_path(owner_id: &str, job_id: Uuid, kind: &ArtifactKind) -> String {
    let prefix = job_prefix(owner_id, job_id);
    match kind {
        ArtifactKind::Request => format!("{}request", prefix),
        ArtifactKind::Result => format!("{}result", prefix),
        ArtifactKind::Error => format!("{}error", prefix),
        ArtifactKind::Image(name) => format!("{}images/{}", prefix, name),
    }
}

/// Owner ids are embedded in artifact paths, so they must be a single path segment.
pub fn is_valid_owner_id(owner_id: &str) -> bool {
    !owner_id.is_empty()
        && owner_id.len() <= 128
        && owner_id != "."
        && owner_id != ".."
        && !owner_id.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_job_prefix() {
        let job_id = Uuid::parse_str("4c1f0c52-9a53-4a55-9d2e-1f6f7b6c1a11").unwrap();
        assert_eq!(
            artifact_path("u1", job_id, &ArtifactKind::Request),
            "jobs/u1/4c1f0c52-9a53-4a55-9d2e-1f6f7b6c1a11/request"
        );
        assert_eq!(
            artifact_path("u1", job_id, &ArtifactKind::Result),
            "jobs/u1/4c1f0c52-9a53-4a55-9d2e-1f6f7b6c1a11/result"
        );
        assert_eq!(
            artifact_path("u1", job_id, &ArtifactKind::Error),
            "jobs/u1/4c1f0c52-9a53-4a55-9d2e-1f6f7b6c1a11/error"
        );
        assert_eq!(
            artifact_path("u1", job_id, &ArtifactKind::Image("heatmap.png".to_string())),
            "jobs/u1/4c1f0c52-9a53-4a55-9d2e-1f6f7b6c1a11/images/heatmap.png"
        );
    }

    #[test]
    fn test_owner_id_must_be_single_segment() {
        assert!(is_valid_owner_id("u1"));
        assert!(!is_valid_owner_id(""));
        assert!(!is_valid_owner_id("a/b"));
        assert!(!is_valid_owner_id(".."));
        assert!(!is_valid_owner_id(&"x".repeat(129)));
    }
}
