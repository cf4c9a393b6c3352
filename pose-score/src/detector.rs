//! Pose detector seam.

use image::RgbImage;

use crate::landmark::Landmark;

/// An opaque landmark detector.
///
/// Returns the full ordered landmark set for the single subject in `image`, or
/// `None` when no subject was found. A miss is not an error; the frame is simply
/// left unscored.
pub trait PoseDetector: Send {
    fn detect(&mut self, image: &RgbImage) -> Option<Vec<Landmark>>;
}

impl<F> PoseDetector for F
where
    F: FnMut(&RgbImage) -> Option<Vec<Landmark>> + Send,
{
    fn detect(&mut self, image: &RgbImage) -> Option<Vec<Landmark>> {
        self(image)
    }
}
