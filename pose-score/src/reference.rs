//! The reference pose every live frame is scored against.
//!
//! Built once at startup from a still image and shared read-only afterwards.
//! It can also be saved as JSON and reloaded without running the detector.

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::angles::{self, AngleTriple, AngleVector};
use crate::detector::PoseDetector;
use crate::error::{PoseError, Result};
use crate::landmark::Landmark;

/// Landmarks and joint angles of the target posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePose {
    landmarks: Vec<Landmark>,
    angles: AngleVector,
}

impl ReferencePose {
    /// Derive the angle vector from a detected landmark set.
    pub fn from_landmarks(landmarks: Vec<Landmark>, triples: &[AngleTriple]) -> Result<Self> {
        let angles = angles::extract(&landmarks, triples)?;
        Ok(Self { landmarks, angles })
    }

    /// Assemble a reference from precomputed parts without validation.
    pub fn from_parts(landmarks: Vec<Landmark>, angles: AngleVector) -> Self {
        Self { landmarks, angles }
    }

    /// Run the detector on an already decoded image.
    pub fn from_image<D>(image: &RgbImage, detector: &mut D, triples: &[AngleTriple]) -> Result<Self>
    where
        D: PoseDetector + ?Sized,
    {
        let landmarks = detector
            .detect(image)
            .ok_or_else(|| PoseError::Detection("reference image".to_string()))?;
        Self::from_landmarks(landmarks, triples)
    }

    /// Load the reference image from disk and run the detector on it.
    pub fn build<D>(path: &Path, detector: &mut D, triples: &[AngleTriple]) -> Result<Self>
    where
        D: PoseDetector + ?Sized,
    {
        let image = image::open(path)
            .map_err(|source| PoseError::ImageLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let landmarks = detector
            .detect(&image)
            .ok_or_else(|| PoseError::Detection(path.display().to_string()))?;

        let reference = Self::from_landmarks(landmarks, triples)?;
        log::info!(
            "Reference pose from {}: {} landmarks, angles {:?}",
            path.display(),
            reference.landmarks.len(),
            reference.angles
        );
        Ok(reference)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Fail unless a live frame of this shape can be scored against the reference.
    pub fn check_shape(&self, landmark_count: usize, angle_count: usize) -> Result<()> {
        PoseError::check_len("landmark count", self.landmarks.len(), landmark_count)?;
        PoseError::check_len("angle vector", self.angles.len(), angle_count)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::POSE_ANGLE_TRIPLES;
    use crate::landmark::BLAZEPOSE_LANDMARK_COUNT;

    fn standing_pose() -> Vec<Landmark> {
        (0..BLAZEPOSE_LANDMARK_COUNT)
            .map(|i| Landmark::new(0.25 + i as f64 / 128.0, 0.125 + i as f64 / 64.0, -0.0625))
            .collect()
    }

    #[test]
    fn test_from_landmarks_computes_angles() {
        let reference = ReferencePose::from_landmarks(standing_pose(), &POSE_ANGLE_TRIPLES).unwrap();
        assert_eq!(reference.landmarks().len(), BLAZEPOSE_LANDMARK_COUNT);
        assert_eq!(reference.angles().len(), 8);
        assert!(reference.check_shape(BLAZEPOSE_LANDMARK_COUNT, 8).is_ok());
        assert!(reference.check_shape(17, 8).is_err());
    }

    #[test]
    fn test_from_image_detection_failure() {
        let image = RgbImage::new(8, 8);
        let mut detector = |_: &RgbImage| -> Option<Vec<Landmark>> { None };
        let err = ReferencePose::from_image(&image, &mut detector, &POSE_ANGLE_TRIPLES).unwrap_err();
        assert!(matches!(err, PoseError::Detection(_)));
    }

    #[test]
    fn test_build_image_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.jpg");
        let mut detector = |_: &RgbImage| Some(standing_pose());
        let err = ReferencePose::build(&path, &mut detector, &POSE_ANGLE_TRIPLES).unwrap_err();
        assert!(matches!(err, PoseError::ImageLoad { .. }));
    }

    #[test]
    fn test_build_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image").unwrap();
        let mut detector = |_: &RgbImage| Some(standing_pose());
        let err = ReferencePose::build(&path, &mut detector, &POSE_ANGLE_TRIPLES).unwrap_err();
        assert!(matches!(err, PoseError::ImageLoad { .. }));
    }

    #[test]
    fn test_build_from_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.png");
        RgbImage::new(16, 16).save(&path).unwrap();

        let mut detector = |image: &RgbImage| {
            assert_eq!(image.dimensions(), (16, 16));
            Some(standing_pose())
        };
        let reference = ReferencePose::build(&path, &mut detector, &POSE_ANGLE_TRIPLES).unwrap();
        assert_eq!(reference.landmarks(), standing_pose().as_slice());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");

        let reference = ReferencePose::from_landmarks(standing_pose(), &POSE_ANGLE_TRIPLES).unwrap();
        reference.save_to_file(&path).unwrap();

        let loaded = ReferencePose::load_from_file(&path).unwrap();
        assert_eq!(loaded, reference);
    }
}
