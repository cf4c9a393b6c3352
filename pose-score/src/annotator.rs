//! Per-joint error flags for the video overlay.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::landmark::Landmark;

/// Overall judgement for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No joint is bent too little.
    Perfect,
    /// At least one joint needs more bend.
    Correcting,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Perfect => write!(f, "PERFECT"),
            Verdict::Correcting => write!(f, "CORRECTING"),
        }
    }
}

/// Joints flagged in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseAnnotation {
    /// Indices into the angle triples of joints in error.
    pub error_joints: BTreeSet<usize>,
    pub verdict: Verdict,
    /// Positions of the flagged joints, in `error_joints` order.
    pub markers: Vec<Landmark>,
}

/// Flags joints whose angle falls short of the reference by more than the tolerance.
///
/// Only "too little bend" counts; being more extended than the target is fine.
/// NaN angles compare false and are never flagged.
#[derive(Debug, Clone)]
pub struct PoseAnnotator {
    tolerance_deg: f64,
}

impl PoseAnnotator {
    pub fn new(tolerance_deg: f64) -> Self {
        Self { tolerance_deg }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.angle_tolerance_deg)
    }

    pub fn annotate(
        &self,
        live: &[f64],
        reference: &[f64],
        joint_positions: &[Landmark],
    ) -> PoseAnnotation {
        let error_joints: BTreeSet<usize> = live
            .iter()
            .zip(reference)
            .enumerate()
            .filter(|(_, (&l, &r))| l < r - self.tolerance_deg)
            .map(|(i, _)| i)
            .collect();

        let markers = error_joints
            .iter()
            .filter_map(|&i| joint_positions.get(i).copied())
            .collect();

        let verdict = if error_joints.is_empty() {
            Verdict::Perfect
        } else {
            Verdict::Correcting
        };

        PoseAnnotation {
            error_joints,
            verdict,
            markers,
        }
    }
}

impl Default for PoseAnnotator {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}
