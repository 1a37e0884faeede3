use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One of the four regions the importance map is split into.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Quadrant {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl Quadrant {
    /// Iteration order, which is also the tie-break order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UpperLeft,
        Quadrant::UpperRight,
        Quadrant::LowerLeft,
        Quadrant::LowerRight,
    ];
}

/// A value per quadrant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct QuadrantValues {
    pub upper_left: f64,
    pub upper_right: f64,
    pub lower_left: f64,
    pub lower_right: f64,
}

impl QuadrantValues {
    pub fn get(&self, quadrant: Quadrant) -> f64 {
        match quadrant {
            Quadrant::UpperLeft => self.upper_left,
            Quadrant::UpperRight => self.upper_right,
            Quadrant::LowerLeft => self.lower_left,
            Quadrant::LowerRight => self.lower_right,
        }
    }

    pub fn set(&mut self, quadrant: Quadrant, value: f64) {
        match quadrant {
            Quadrant::UpperLeft => self.upper_left = value,
            Quadrant::UpperRight => self.upper_right = value,
            Quadrant::LowerLeft => self.lower_left = value,
            Quadrant::LowerRight => self.lower_right = value,
        }
    }

    pub fn sum(&self) -> f64 {
        Quadrant::ALL.iter().map(|q| self.get(*q)).sum()
    }
}

/// Mean importance of one superpixel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SuperpixelScore {
    pub segment: u32,
    pub score: f64,
}

/// Compact summary of an importance map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportanceSummary {
    pub most_important_quadrant: Quadrant,
    pub quadrant_scores: QuadrantValues,
    pub relative_importances: QuadrantValues,
    /// Unbounded; negative for highly dispersed maps.
    pub stability_score: f64,
    pub importance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superpixel_ranking: Option<Vec<SuperpixelScore>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.8 {
            ConfidenceLevel::High
        } else if confidence > 0.6 {
            ConfidenceLevel::Moderate
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Classifier outcome attached to every successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
}

impl Prediction {
    /// Name the predicted class using the configured labels.
    pub fn from_class(class_index: usize, confidence: f64, labels: &[String]) -> Self {
        let label = labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_index));
        Self {
            label,
            class_index,
            confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisMetadata {
    /// Seconds spent in the worker, fetch included.
    pub analysis_duration: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Reference to a rendered visualization artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visualization {
    pub key: String,
    pub content_type: String,
}

/// Payload of the `result` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub prediction: Prediction,
    #[serde(flatten)]
    pub analysis: ImportanceSummary,
    pub metadata: AnalysisMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceLevel::from_confidence(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.8), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceLevel::from_confidence(0.61), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceLevel::from_confidence(0.6), ConfidenceLevel::Low);
    }

    #[test]
    fn test_prediction_label_lookup() {
        let labels = vec![
            "no aneurysm detected".to_string(),
            "aneurysm detected".to_string(),
        ];
        assert_eq!(Prediction::from_class(1, 0.9, &labels).label, "aneurysm detected");
        assert_eq!(Prediction::from_class(7, 0.9, &labels).label, "class 7");
    }

    #[test]
    fn test_quadrant_names() {
        assert_eq!(Quadrant::LowerLeft.to_string(), "lower_left");
        assert_eq!(
            serde_json::to_value(Quadrant::UpperRight).unwrap(),
            serde_json::json!("upper_right")
        );
    }

    #[test]
    fn test_summary_fields_flattened_into_result() {
        let result = AnalysisResult {
            prediction: Prediction::from_class(0, 0.5, &[]),
            analysis: ImportanceSummary {
                most_important_quadrant: Quadrant::UpperLeft,
                quadrant_scores: QuadrantValues::default(),
                relative_importances: QuadrantValues::default(),
                stability_score: 1.0,
                importance_score: 0.42,
                superpixel_ranking: None,
            },
            metadata: AnalysisMetadata {
                analysis_duration: 1.5,
                start_time: Utc::now(),
                end_time: Utc::now(),
            },
            visualization: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["importance_score"], serde_json::json!(0.42));
        assert_eq!(value["most_important_quadrant"], serde_json::json!("upper_left"));
        assert!(value.get("superpixel_ranking").is_none());
        assert!(value.get("visualization").is_none());

        let back: AnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.analysis.importance_score, 0.42);
    }
}
