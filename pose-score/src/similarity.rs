//! Similarity between a live pose and the reference pose.
//!
//! Two independent channels are computed and blended:
//!
//! - **Point distance**: mean per-landmark cosine similarity of the raw
//!   `(x, y, z)` vectors, rounded, then mapped to a Euclidean-on-unit-sphere
//!   distance `sqrt(2 * (1 - mean))`.
//! - **Angle distance**: mean relative symmetric difference of the joint angles.
//!
//! The blended score keeps the more forgiving of the two channels. Landmark
//! cosine similarity is blind to in-plane limb rotation while angle comparison
//! ignores depth noise, so a single noisy channel should not fail a good pose.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::{PoseError, Result};
use crate::landmark::Landmark;
use crate::reference::ReferencePose;

/// Per-frame similarity result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    pub point_distance: f64,
    pub angle_distance: f64,
    /// Blended score in `[0, 100]`, or NaN when both channels are NaN.
    pub blended: f64,
}

impl FrameScore {
    pub fn new(point_distance: f64, angle_distance: f64) -> Self {
        Self {
            point_distance,
            angle_distance,
            blended: blend(point_distance, angle_distance),
        }
    }
}

/// Cosine similarity of two landmarks viewed as 3-vectors.
///
/// NaN when either vector has zero length.
pub fn cosine_similarity(u: &Landmark, v: &Landmark) -> f64 {
    let (u, v) = (u.to_vector(), v.to_vector());
    u.dot(&v) / (u.norm() * v.norm())
}

/// Round half to even, so 0.125 becomes 0.12 at two decimals.
fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Cosine-derived distance between two landmark sets.
///
/// Zero when every pairwise cosine similarity is 1.
pub fn point_distance(live: &[Landmark], reference: &[Landmark], decimals: u32) -> Result<f64> {
    PoseError::check_len("landmark count", reference.len(), live.len())?;

    let total: f64 = live
        .iter()
        .zip(reference)
        .map(|(l, r)| cosine_similarity(l, r))
        .sum();
    let mean = round_to(total / live.len() as f64, decimals);

    Ok((2.0 * (1.0 - mean)).sqrt())
}

/// Mean relative symmetric difference `|l - r| / ((l + r) / 2)` of two angle vectors.
///
/// A joint where both angles are zero contributes NaN, which makes the mean NaN.
pub fn angle_distance(live: &[f64], reference: &[f64]) -> Result<f64> {
    PoseError::check_len("angle vector", reference.len(), live.len())?;

    let total: f64 = live
        .iter()
        .zip(reference)
        .map(|(&l, &r)| (l - r).abs() / ((l + r) / 2.0))
        .sum();

    Ok(total / live.len() as f64)
}

/// Blend both distances into a `[0, 100]` score.
///
/// Uses `f64::max`, so a NaN channel falls back to the other one.
pub fn blend(point_distance: f64, angle_distance: f64) -> f64 {
    let raw = (1.0 - angle_distance).max(1.0 - point_distance) * 100.0;
    raw.clamp(0.0, 100.0)
}

/// Scores live frames against a reference pose.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    decimals: u32,
}

impl SimilarityScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            decimals: config.point_distance_decimals,
        }
    }

    pub fn score(
        &self,
        landmarks: &[Landmark],
        angles: &[f64],
        reference: &ReferencePose,
    ) -> Result<FrameScore> {
        let point = point_distance(landmarks, reference.landmarks(), self.decimals)?;
        let angle = angle_distance(angles, reference.angles())?;
        Ok(FrameScore::new(point, angle))
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}
