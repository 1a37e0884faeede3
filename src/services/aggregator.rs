use std::collections::BTreeMap;

use crate::models::analysis::{ImportanceSummary, Quadrant, QuadrantValues, SuperpixelScore};
use crate::models::importance::{ImportanceMap, SegmentMap};

/// Guard added to denominators that may be zero.
pub const EPSILON: f64 = 1e-7;

/// Number of superpixels kept in the ranking.
pub const SUPERPIXEL_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AggregateError {
    #[error("Invalid aggregator input: {0}")]
    InvalidInput(String),
}

/// Summarize an importance map.
///
/// Pure and deterministic: the same map and segmentation always produce the
/// same summary.
pub fn aggregate(
    map: &ImportanceMap,
    segments: Option<&SegmentMap>,
) -> Result<ImportanceSummary, AggregateError> {
    let (quadrant_scores, populated) = quadrant_scores(map);
    let most_important_quadrant = most_important(&quadrant_scores, &populated);
    let relative_importances = relative_importances(map);

    let superpixel_ranking = match segments {
        Some(segments) => Some(superpixel_ranking(map, segments)?),
        None => None,
    };

    Ok(ImportanceSummary {
        most_important_quadrant,
        quadrant_scores,
        relative_importances,
        stability_score: stability_score(map),
        importance_score: importance_score(map),
        superpixel_ranking,
    })
}

/// Row and column ranges of a quadrant. The midpoint uses integer division, so
/// odd remainders fall into the lower and right quadrants.
pub fn quadrant_bounds(
    map: &ImportanceMap,
    quadrant: Quadrant,
) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
    let (h, w) = (map.height(), map.width());
    let (mid_h, mid_w) = (h / 2, w / 2);
    match quadrant {
        Quadrant::UpperLeft => (0..mid_h, 0..mid_w),
        Quadrant::UpperRight => (0..mid_h, mid_w..w),
        Quadrant::LowerLeft => (mid_h..h, 0..mid_w),
        Quadrant::LowerRight => (mid_h..h, mid_w..w),
    }
}

/// Signed mean per quadrant. Quadrants with no pixels (a 1-pixel-tall or
/// 1-pixel-wide map) score 0.0 and are flagged as unpopulated.
fn quadrant_scores(map: &ImportanceMap) -> (QuadrantValues, [bool; 4]) {
    let mut scores = QuadrantValues::default();
    let mut populated = [false; 4];
    for (i, quadrant) in Quadrant::ALL.iter().enumerate() {
        let (rows, cols) = quadrant_bounds(map, *quadrant);
        let count = rows.len() * cols.len();
        if count == 0 {
            continue;
        }
        let sum: f64 = map.region(rows, cols).sum();
        scores.set(*quadrant, sum / count as f64);
        populated[i] = true;
    }
    (scores, populated)
}

/// Highest signed mean among populated quadrants; the earliest quadrant wins ties.
fn most_important(scores: &QuadrantValues, populated: &[bool; 4]) -> Quadrant {
    let mut best: Option<(Quadrant, f64)> = None;
    for (i, quadrant) in Quadrant::ALL.iter().enumerate() {
        if !populated[i] {
            continue;
        }
        let score = scores.get(*quadrant);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((*quadrant, score)),
        }
    }
    // The lower-right quadrant is never empty for a non-empty map.
    best.map(|(q, _)| q).unwrap_or(Quadrant::LowerRight)
}

/// Share of total absolute importance held by each quadrant.
fn relative_importances(map: &ImportanceMap) -> QuadrantValues {
    let total: f64 = map.values().iter().map(|v| v.abs()).sum();
    let mut relative = QuadrantValues::default();
    for quadrant in Quadrant::ALL {
        let (rows, cols) = quadrant_bounds(map, quadrant);
        let part: f64 = map.region(rows, cols).map(f64::abs).sum();
        relative.set(quadrant, part / (total + EPSILON));
    }
    relative
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `1 - std(M) / (mean(M) + ε)`, unclamped.
pub fn stability_score(map: &ImportanceMap) -> f64 {
    1.0 - std_dev(map.values()) / (mean(map.values()) + EPSILON)
}

/// `mean(|M|)`.
pub fn importance_score(map: &ImportanceMap) -> f64 {
    map.values().iter().map(|v| v.abs()).sum::<f64>() / map.values().len() as f64
}

/// Rank segments by mean importance, highest first, keeping the top
/// [`SUPERPIXEL_TOP_K`]. Label indices without any pixel are skipped.
pub fn superpixel_ranking(
    map: &ImportanceMap,
    segments: &SegmentMap,
) -> Result<Vec<SuperpixelScore>, AggregateError> {
    if segments.height() != map.height() || segments.width() != map.width() {
        return Err(AggregateError::InvalidInput(format!(
            "segment map {}x{} does not match importance map {}x{}",
            segments.height(),
            segments.width(),
            map.height(),
            map.width()
        )));
    }

    // Keyed by label so sparse label indices cost nothing.
    let mut totals: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (label, value) in segments.labels().iter().zip(map.values()) {
        let entry = totals.entry(*label).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    let mut ranking: Vec<SuperpixelScore> = totals
        .into_iter()
        .map(|(segment, (sum, count))| SuperpixelScore {
            segment,
            score: sum / count as f64,
        })
        .collect();

    // Stable sort: equal scores keep ascending segment order.
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranking.truncate(SUPERPIXEL_TOP_K);
    Ok(ranking)
}
