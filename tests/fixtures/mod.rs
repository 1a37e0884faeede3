//! Importance tensors and analysis results shared by the integration tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};

use explain_jobs::models::analysis::{
    AnalysisMetadata, AnalysisResult, ImportanceSummary, Prediction, Quadrant, QuadrantValues,
};
use explain_jobs::models::importance::ImportanceTensor;

pub const IMAGE_URL: &str = "https://x/img.png";

pub fn class_labels() -> Vec<String> {
    vec![
        "no aneurysm detected".to_string(),
        "aneurysm detected".to_string(),
    ]
}

/// `[[1, -1], [2, -2]]`: the lower-left cell dominates.
pub fn signed_two_by_two() -> ImportanceTensor {
    ImportanceTensor {
        shape: vec![2, 2],
        values: vec![1.0, -1.0, 2.0, -2.0],
    }
}

/// Explainer-shaped `[1, H, W, 3, 1]` tensor with importance concentrated in the
/// upper-right corner.
pub fn hot_upper_right(height: usize, width: usize) -> ImportanceTensor {
    let mut values = Vec::with_capacity(height * width * 3);
    for row in 0..height {
        for col in 0..width {
            let hot = row < height / 2 && col >= width / 2;
            let v = if hot { 0.9 } else { 0.05 };
            values.extend_from_slice(&[v, -v, v]);
        }
    }
    ImportanceTensor {
        shape: vec![1, height, width, 3, 1],
        values,
    }
}

/// Result artifact as a worker would write it.
pub fn analysis_result(importance_score: f64) -> AnalysisResult {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 42).unwrap();
    AnalysisResult {
        prediction: Prediction::from_class(1, 0.91, &class_labels()),
        analysis: ImportanceSummary {
            most_important_quadrant: Quadrant::UpperRight,
            quadrant_scores: QuadrantValues {
                upper_left: 0.1,
                upper_right: 0.7,
                lower_left: 0.2,
                lower_right: 0.3,
            },
            relative_importances: QuadrantValues {
                upper_left: 0.08,
                upper_right: 0.54,
                lower_left: 0.15,
                lower_right: 0.23,
            },
            stability_score: 0.37,
            importance_score,
            superpixel_ranking: None,
        },
        metadata: AnalysisMetadata {
            analysis_duration: 42.0,
            start_time: start,
            end_time: end,
        },
        visualization: None,
    }
}
