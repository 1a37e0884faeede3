use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use crate::models::analysis::{AnalysisMetadata, AnalysisResult, Prediction, Visualization};
use crate::models::artifact::{artifact_path, ArtifactKind};
use crate::models::importance::{ImportanceMap, SegmentMap};
use crate::models::job::{DispatchPayload, ErrorKind, ErrorPayload};
use crate::services::aggregator::{self, AggregateError};
use crate::services::engine::{validate_prediction, EngineError, ExplainabilityEngine};
use crate::services::fetch::{FetchError, ImageSource};
use crate::services::render::{self, HEATMAP_CONTENT_TYPE};
use crate::services::segmentation::Segmenter;
use crate::services::storage::{ArtifactStore, StorageError};

const HEATMAP_NAME: &str = "heatmap.png";

/// Tunables for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Class labels indexed by the engine's class index.
    pub class_labels: Vec<String>,
    pub render_visualizations: bool,
}

/// Terminal artifact the worker managed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Failed(ErrorKind),
}

/// Executes one explainability job and records its outcome as exactly one
/// `result` or `error` artifact.
///
/// Workers never touch job records; the orchestrator picks the artifact up on
/// the next reconcile.
pub struct Worker {
    images: Arc<dyn ImageSource>,
    engine: Arc<dyn ExplainabilityEngine>,
    segmenter: Option<Arc<dyn Segmenter>>,
    artifacts: Arc<dyn ArtifactStore>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        images: Arc<dyn ImageSource>,
        engine: Arc<dyn ExplainabilityEngine>,
        segmenter: Option<Arc<dyn Segmenter>>,
        artifacts: Arc<dyn ArtifactStore>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            images,
            engine,
            segmenter,
            artifacts,
            settings,
        }
    }

    /// Run the job to completion.
    ///
    /// Every failure inside the analysis becomes an `error` artifact. An `Err`
    /// is returned only when the terminal artifact itself cannot be written,
    /// in which case the job stays `processing` forever.
    pub async fn run(&self, payload: &DispatchPayload) -> Result<WorkerOutcome, TerminalWriteError> {
        let started = Instant::now();
        tracing::info!(
            job_id = %payload.job_id,
            owner_id = %payload.owner_id,
            source_image_ref = %payload.source_image_ref,
            "Processing explainability job"
        );

        let outcome = match self.analyze(payload).await {
            Ok(result) => {
                let path = artifact_path(&payload.owner_id, payload.job_id, &ArtifactKind::Result);
                self.write_terminal(&path, &result).await?;
                tracing::info!(
                    job_id = %payload.job_id,
                    label = %result.prediction.label,
                    confidence = result.prediction.confidence,
                    quadrant = %result.analysis.most_important_quadrant,
                    importance_score = result.analysis.importance_score,
                    "Job completed"
                );
                WorkerOutcome::Completed
            }
            Err(e) => {
                let kind = e.kind();
                tracing::error!(job_id = %payload.job_id, kind = %kind, error = %e, "Job failed");
                let path = artifact_path(&payload.owner_id, payload.job_id, &ArtifactKind::Error);
                self.write_terminal(&path, &ErrorPayload::new(kind, e.to_string()))
                    .await?;
                WorkerOutcome::Failed(kind)
            }
        };

        let label = match outcome {
            WorkerOutcome::Completed => "completed",
            WorkerOutcome::Failed(_) => "failed",
        };
        metrics::counter!("explain_worker_runs_total", "outcome" => label).increment(1);
        metrics::histogram!("explain_worker_duration_seconds").record(started.elapsed().as_secs_f64());

        Ok(outcome)
    }

    async fn analyze(&self, payload: &DispatchPayload) -> Result<AnalysisResult, WorkerError> {
        let start_time = Utc::now();
        let started = Instant::now();

        tracing::debug!(job_id = %payload.job_id, "Fetching source image");
        let image = self
            .images
            .fetch(&payload.source_image_ref)
            .await
            .map_err(WorkerError::FetchFailure)?;

        tracing::debug!(job_id = %payload.job_id, "Running explainability engine");
        let engine_start = Instant::now();
        let explanation = self
            .engine
            .compute(&image)
            .await
            .map_err(WorkerError::EngineFailure)?;
        validate_prediction(&explanation.prediction).map_err(WorkerError::EngineFailure)?;
        tracing::info!(
            job_id = %payload.job_id,
            engine_duration_ms = engine_start.elapsed().as_millis() as u64,
            shape = ?explanation.importance.shape,
            "Engine computation complete"
        );

        let map = explanation.importance.reduce()?;
        let segments = self.segment(payload, &image, &map);
        let analysis = aggregator::aggregate(&map, segments.as_ref())?;
        if !analysis.stability_score.is_finite() {
            return Err(AggregateError::InvalidInput(
                "stability score is not finite (mean importance cancels epsilon)".to_string(),
            )
            .into());
        }

        let prediction = Prediction::from_class(
            explanation.prediction.class_index,
            explanation.prediction.confidence,
            &self.settings.class_labels,
        );

        let visualization = if self.settings.render_visualizations {
            self.render_visualization(payload, &map).await
        } else {
            None
        };

        Ok(AnalysisResult {
            prediction,
            analysis,
            metadata: AnalysisMetadata {
                analysis_duration: started.elapsed().as_secs_f64(),
                start_time,
                end_time: Utc::now(),
            },
            visualization,
        })
    }

    /// Segmentation is a refinement; without it the ranking is omitted.
    fn segment(
        &self,
        payload: &DispatchPayload,
        image: &[u8],
        map: &ImportanceMap,
    ) -> Option<SegmentMap> {
        let segmenter = self.segmenter.as_ref()?;
        match segmenter.segment(image, map.height(), map.width()) {
            Ok(segments) => Some(segments),
            Err(e) => {
                tracing::warn!(job_id = %payload.job_id, error = %e, "Segmentation failed, skipping superpixel ranking");
                None
            }
        }
    }

    /// Best effort: a failed render or upload leaves the result without a
    /// visualization.
    async fn render_visualization(
        &self,
        payload: &DispatchPayload,
        map: &ImportanceMap,
    ) -> Option<Visualization> {
        let png = match render::render_heatmap(map) {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(job_id = %payload.job_id, error = %e, "Heat-map rendering failed");
                return None;
            }
        };

        let key = artifact_path(
            &payload.owner_id,
            payload.job_id,
            &ArtifactKind::Image(HEATMAP_NAME.to_string()),
        );
        match self.artifacts.put(&key, &png, HEATMAP_CONTENT_TYPE).await {
            Ok(()) => Some(Visualization {
                key,
                content_type: HEATMAP_CONTENT_TYPE.to_string(),
            }),
            Err(e) => {
                tracing::warn!(job_id = %payload.job_id, path = %key, error = %e, "Heat-map upload failed");
                None
            }
        }
    }

    async fn write_terminal<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), TerminalWriteError> {
        let fail = |source: StorageError| {
            tracing::error!(path = %path, error = %source, "Terminal artifact write failed, job will stay processing");
            TerminalWriteError {
                path: path.to_string(),
                source,
            }
        };

        let bytes = serde_json::to_vec(body)
            .map_err(|e| fail(StorageError::Unavailable(format!("serialization: {}", e))))?;
        self.artifacts
            .put(path, &bytes, "application/json")
            .await
            .map_err(fail)
    }
}

/// Failures inside one job run. Each is recorded in the `error` artifact.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Source image fetch failed: {0}")]
    FetchFailure(#[from] FetchError),

    #[error("Explainability engine failed: {0}")]
    EngineFailure(#[from] EngineError),

    #[error("{0}")]
    InvalidInput(#[from] AggregateError),
}

impl WorkerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::FetchFailure(_) => ErrorKind::FetchFailure,
            WorkerError::EngineFailure(_) => ErrorKind::EngineFailure,
            WorkerError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// The terminal artifact could not be stored; the job is stuck in `processing`.
#[derive(Debug, thiserror::Error)]
#[error("Terminal artifact write to {path} failed: {source}")]
pub struct TerminalWriteError {
    pub path: String,
    #[source]
    pub source: StorageError,
}
