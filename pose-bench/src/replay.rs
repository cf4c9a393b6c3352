//! Detector that replays recorded landmark sets.
//!
//! The recording is a JSON array with one entry per frame; each entry is either
//! an array of `{"x", "y", "z"}` landmarks or `null` for a frame where nothing
//! was detected. Entries are replayed in order and wrap around at the end.

use std::path::Path;

use image::RgbImage;
use pose_score::{Landmark, PoseDetector};

pub struct ReplayDetector {
    frames: Vec<Option<Vec<Landmark>>>,
    cursor: usize,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Option<Vec<Landmark>>>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Always detect the same landmarks.
    pub fn constant(landmarks: Vec<Landmark>) -> Self {
        Self::new(vec![Some(landmarks)])
    }

    pub fn from_file(path: &Path) -> pose_score::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let frames: Vec<Option<Vec<Landmark>>> = serde_json::from_str(&json)?;
        tracing::info!(
            "Loaded {} recorded frames ({} with detections) from {}",
            frames.len(),
            frames.iter().filter(|f| f.is_some()).count(),
            path.display()
        );
        Ok(Self::new(frames))
    }

    /// Recorded entries in playback order.
    pub fn into_frames(self) -> Vec<Option<Vec<Landmark>>> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PoseDetector for ReplayDetector {
    fn detect(&mut self, _image: &RgbImage) -> Option<Vec<Landmark>> {
        if self.frames.is_empty() {
            return None;
        }
        let landmarks = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor += 1;
        landmarks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_cycles() {
        let a = vec![Landmark::planar(0.1, 0.2)];
        let b = vec![Landmark::planar(0.3, 0.4)];
        let mut detector = ReplayDetector::new(vec![Some(a.clone()), None, Some(b.clone())]);
        let image = RgbImage::new(1, 1);

        assert_eq!(detector.detect(&image), Some(a.clone()));
        assert_eq!(detector.detect(&image), None);
        assert_eq!(detector.detect(&image), Some(b));
        assert_eq!(detector.detect(&image), Some(a));
    }

    #[test]
    fn test_empty_recording_detects_nothing() {
        let mut detector = ReplayDetector::new(Vec::new());
        assert!(detector.is_empty());
        assert_eq!(detector.detect(&RgbImage::new(1, 1)), None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landmarks.json");
        std::fs::write(
            &path,
            r#"[[{"x":0.5,"y":0.25,"z":0.0}], null, [{"x":0.75,"y":0.5,"z":-0.125}]]"#,
        )
        .unwrap();

        let mut detector = ReplayDetector::from_file(&path).unwrap();
        assert_eq!(detector.len(), 3);

        let image = RgbImage::new(1, 1);
        assert_eq!(
            detector.detect(&image),
            Some(vec![Landmark::new(0.5, 0.25, 0.0)])
        );
        assert_eq!(detector.detect(&image), None);

        let frames = ReplayDetector::from_file(&path).unwrap().into_frames();
        assert_eq!(frames.len(), 3);
        assert!(frames[1].is_none());
        assert_eq!(frames[2], Some(vec![Landmark::new(0.75, 0.5, -0.125)]));
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landmarks.json");
        std::fs::write(&path, r#"{"frames": 3}"#).unwrap();
        assert!(matches!(
            ReplayDetector::from_file(&path),
            Err(pose_score::PoseError::Json(_))
        ));
    }
}
