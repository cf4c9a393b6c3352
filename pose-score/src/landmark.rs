//! Body landmarks as reported by the pose detector.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Number of landmarks in the BlazePose full-body topology.
pub const BLAZEPOSE_LANDMARK_COUNT: usize = 33;

/// A single detector keypoint.
///
/// `x` and `y` are normalized image coordinates (0.0 to 1.0, origin top-left).
/// `z` is the detector's relative depth estimate and has no fixed range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Landmark in the image plane (`z = 0`).
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// The landmark as a 3-vector, used for cosine comparisons.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Convert to pixel coordinates for an image of the given size.
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f64) as i32;
        let py = (self.y * height as f64) as i32;
        (px, py)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Landmark {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}
