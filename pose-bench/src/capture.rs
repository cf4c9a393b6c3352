//! Frame capture sources.
//!
//! A [`CaptureDevice`] is opened once per session and yields a [`FrameSource`],
//! an ordered stream of RGB frames that ends when the source is exhausted.
//! The devices here stand in for a camera: one repeats a still image, the other
//! plays back a directory of image files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, warn};

/// Errors opening a capture source.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to read frame directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No image frames found in {0}")]
    Empty(PathBuf),

    #[error("Failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A time-ordered stream of frames. `None` signals end of stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<RgbImage>;
}

/// Something that can be opened into a fresh [`FrameSource`] for each session.
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Repeats one frame, optionally paced and optionally limited.
pub struct RepeatingSource {
    frame: RgbImage,
    remaining: Option<u64>,
    interval: Option<Duration>,
}

impl RepeatingSource {
    pub fn new(frame: RgbImage, frame_limit: Option<u64>, interval: Option<Duration>) -> Self {
        Self {
            frame,
            remaining: frame_limit,
            interval,
        }
    }
}

impl FrameSource for RepeatingSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        match self.remaining {
            Some(0) => return None,
            Some(ref mut n) => *n -= 1,
            None => {}
        }

        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
        Some(self.frame.clone())
    }
}

/// Mock camera serving a single still image.
pub struct RepeatingDevice {
    frame: RgbImage,
    frame_limit: Option<u64>,
    interval: Option<Duration>,
}

impl RepeatingDevice {
    pub fn new(frame: RgbImage, frame_limit: Option<u64>, interval: Option<Duration>) -> Self {
        Self {
            frame,
            frame_limit,
            interval,
        }
    }

    pub fn from_file(
        path: &Path,
        frame_limit: Option<u64>,
        interval: Option<Duration>,
    ) -> Result<Self, CaptureError> {
        let frame = image::open(path)
            .map_err(|source| CaptureError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        Ok(Self::new(frame, frame_limit, interval))
    }
}

impl CaptureDevice for RepeatingDevice {
    fn name(&self) -> &str {
        "repeating"
    }

    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(RepeatingSource::new(
            self.frame.clone(),
            self.frame_limit,
            self.interval,
        )))
    }
}

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Plays back the image files of a directory in file name order.
pub struct ImageSequenceDevice {
    dir: PathBuf,
    interval: Option<Duration>,
}

impl ImageSequenceDevice {
    pub fn new(dir: PathBuf, interval: Option<Duration>) -> Self {
        Self { dir, interval }
    }

    /// Sorted image files in the directory.
    pub fn frame_paths(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| CaptureError::Directory {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CaptureError::Empty(self.dir.clone()));
        }
        Ok(paths)
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn name(&self) -> &str {
        "image-sequence"
    }

    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        let paths = self.frame_paths()?;
        debug!("Opened {} frames from {}", paths.len(), self.dir.display());
        Ok(Box::new(ImageSequenceSource {
            paths,
            cursor: 0,
            interval: self.interval,
        }))
    }
}

/// Frame stream over a list of image files. Unreadable files are skipped.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    interval: Option<Duration>,
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        while let Some(path) = self.paths.get(self.cursor) {
            self.cursor += 1;

            if let Some(interval) = self.interval {
                std::thread::sleep(interval);
            }

            match image::open(path) {
                Ok(img) => return Some(img.to_rgb8()),
                Err(e) => warn!("Skipping unreadable frame {}: {e}", path.display()),
            }
        }
        None
    }
}
