use serde::{Deserialize, Serialize};

use crate::services::aggregator::AggregateError;

/// Raw attribution tensor as produced by the Explainability Engine.
///
/// `values` is row-major over `shape`. Supported layouts are `[H, W]`,
/// `[H, W, C]`, `[N, H, W, C]` and `[N, H, W, C, O]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportanceTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl ImportanceTensor {
    /// Collapse the tensor to a 2-D `H×W` map.
    ///
    /// A rank-2 tensor keeps its signed values. Higher ranks are reduced by the
    /// mean of absolute values over the sample and channel axes.
    pub fn reduce(&self) -> Result<ImportanceMap, AggregateError> {
        let expected: usize = self.shape.iter().product();
        if self.shape.is_empty() || expected == 0 {
            return Err(AggregateError::InvalidInput(format!(
                "empty importance tensor (shape {:?})",
                self.shape
            )));
        }
        if expected != self.values.len() {
            return Err(AggregateError::InvalidInput(format!(
                "tensor shape {:?} expects {} values, got {}",
                self.shape,
                expected,
                self.values.len()
            )));
        }

        // (leading samples, height, width, trailing channel elements)
        let (lead, height, width, trail) = match self.shape.as_slice() {
            [h, w] => {
                let values = self.values.iter().map(|&v| v as f64).collect();
                return ImportanceMap::new(*h, *w, values);
            }
            [h, w, c] => (1, *h, *w, *c),
            [n, h, w, c] => (*n, *h, *w, *c),
            [n, h, w, c, o] => (*n, *h, *w, c * o),
            other => {
                return Err(AggregateError::InvalidInput(format!(
                    "unsupported tensor rank {} (shape {:?})",
                    other.len(),
                    other
                )))
            }
        };

        let per_pixel = (lead * trail) as f64;
        let mut reduced = vec![0.0f64; height * width];
        for n in 0..lead {
            for row in 0..height {
                for col in 0..width {
                    let base = ((n * height + row) * width + col) * trail;
                    let sum: f64 = self.values[base..base + trail]
                        .iter()
                        .map(|v| (*v as f64).abs())
                        .sum();
                    reduced[row * width + col] += sum;
                }
            }
        }
        for cell in reduced.iter_mut() {
            *cell /= per_pixel;
        }

        ImportanceMap::new(height, width, reduced)
    }
}

/// A validated, non-empty 2-D importance map stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMap {
    height: usize,
    width: usize,
    values: Vec<f64>,
}

impl ImportanceMap {
    pub fn new(height: usize, width: usize, values: Vec<f64>) -> Result<Self, AggregateError> {
        if height == 0 || width == 0 {
            return Err(AggregateError::InvalidInput(format!(
                "empty importance map ({}x{})",
                height, width
            )));
        }
        if values.len() != height * width {
            return Err(AggregateError::InvalidInput(format!(
                "importance map {}x{} expects {} values, got {}",
                height,
                width,
                height * width,
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AggregateError::InvalidInput(
                "importance map contains non-finite values".to_string(),
            ));
        }
        Ok(Self {
            height,
            width,
            values,
        })
    }

    /// Build a map from equally sized rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, AggregateError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(AggregateError::InvalidInput(
                "importance map rows have different lengths".to_string(),
            ));
        }
        Self::new(height, width, rows.concat())
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width + col]
    }

    /// Values inside the half-open row and column ranges.
    pub fn region(
        &self,
        rows: std::ops::Range<usize>,
        cols: std::ops::Range<usize>,
    ) -> impl Iterator<Item = f64> + '_ {
        rows.flat_map(move |row| {
            let start = row * self.width;
            self.values[start + cols.start..start + cols.end].iter().copied()
        })
    }
}

/// Superpixel label map: one segment index per pixel, same extent as the
/// importance map it is paired with.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMap {
    height: usize,
    width: usize,
    labels: Vec<u32>,
}

impl SegmentMap {
    pub fn new(height: usize, width: usize, labels: Vec<u32>) -> Result<Self, AggregateError> {
        if labels.len() != height * width {
            return Err(AggregateError::InvalidInput(format!(
                "segment map {}x{} expects {} labels, got {}",
                height,
                width,
                height * width,
                labels.len()
            )));
        }
        Ok(Self {
            height,
            width,
            labels,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}
