//! Joint angle extraction.
//!
//! A joint angle is measured at the vertex landmark `b` of an [`AngleTriple`]
//! between the rays `b -> a` and `b -> c`, using only the image-plane (x, y)
//! components. The reference pose and every live frame are reduced to the same
//! ordered [`AngleVector`], so the triple order below must never change without
//! recomputing the reference.
//!
//! # Angle wrap
//!
//! The difference of the two ray bearings lies in (-360°, 360°). Its magnitude
//! is folded exactly once: values above 180° become `360 - value`. This is not a
//! full modulo and scores are defined relative to this transform, so it must be
//! kept as is.
//!
//! Angles are truncated toward zero to whole degrees before scoring.

use std::f64::consts::PI;

use crate::error::{PoseError, Result};
use crate::landmark::Landmark;

/// Ordered joint angles in degrees, one per [`AngleTriple`].
pub type AngleVector = Vec<f64>;

/// BlazePose landmark indices used by the joint angles.
pub mod blazepose {
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
}

/// Three landmark indices defining one joint angle, vertex at `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngleTriple {
    pub name: &'static str,
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl AngleTriple {
    pub const fn new(name: &'static str, a: usize, b: usize, c: usize) -> Self {
        Self { name, a, b, c }
    }

    fn max_index(&self) -> usize {
        self.a.max(self.b).max(self.c)
    }
}

use blazepose::*;

/// The eight joints scored against the reference pose.
pub const POSE_ANGLE_TRIPLES: [AngleTriple; 8] = [
    AngleTriple::new("right_elbow", RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST),
    AngleTriple::new("left_elbow", LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST),
    AngleTriple::new("right_shoulder", RIGHT_ELBOW, RIGHT_SHOULDER, RIGHT_HIP),
    AngleTriple::new("left_shoulder", LEFT_ELBOW, LEFT_SHOULDER, LEFT_HIP),
    AngleTriple::new("right_hip", RIGHT_SHOULDER, RIGHT_HIP, RIGHT_KNEE),
    AngleTriple::new("left_hip", LEFT_SHOULDER, LEFT_HIP, LEFT_KNEE),
    AngleTriple::new("right_knee", RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE),
    AngleTriple::new("left_knee", LEFT_HIP, LEFT_KNEE, LEFT_ANKLE),
];

/// Angle at `b` between rays `b -> a` and `b -> c`, in degrees.
///
/// Not truncated. Coincident points give a zero-length ray whose bearing is
/// `atan2(0, 0) = 0`; NaN coordinates give NaN.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = (radians * 180.0 / PI).abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Check that every triple index is inside a landmark set of `len` entries.
pub fn check_triples(len: usize, triples: &[AngleTriple]) -> Result<()> {
    match triples.iter().map(AngleTriple::max_index).max() {
        Some(max) if max >= len => Err(PoseError::ShapeMismatch {
            what: "angle triple landmark index",
            expected: max + 1,
            actual: len,
        }),
        _ => Ok(()),
    }
}

/// Compute the whole-degree angle vector for a landmark set.
///
/// Fails only when a triple refers past the end of `landmarks`.
pub fn extract(landmarks: &[Landmark], triples: &[AngleTriple]) -> Result<AngleVector> {
    check_triples(landmarks.len(), triples)?;

    Ok(triples
        .iter()
        .map(|t| joint_angle(&landmarks[t.a], &landmarks[t.b], &landmarks[t.c]).trunc())
        .collect())
}

/// Vertex landmark of each triple, where error markers are drawn.
pub fn joint_positions(landmarks: &[Landmark], triples: &[AngleTriple]) -> Result<Vec<Landmark>> {
    check_triples(landmarks.len(), triples)?;
    Ok(triples.iter().map(|t| landmarks[t.b]).collect())
}
