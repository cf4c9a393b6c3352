//! Pose similarity scoring against a fixed reference posture.
//!
//! A frame's landmarks are reduced to eight joint angles, compared with the
//! reference pose through two independent distance channels, blended into a
//! 0-100 score, and accumulated by a [`SessionController`] over a timed session.

pub mod angles;
pub mod annotator;
pub mod config;
pub mod detector;
pub mod error;
pub mod landmark;
pub mod reference;
pub mod session;
pub mod similarity;

pub use angles::{AngleTriple, AngleVector, POSE_ANGLE_TRIPLES};
pub use annotator::{PoseAnnotation, PoseAnnotator, Verdict};
pub use config::ScoringConfig;
pub use detector::PoseDetector;
pub use error::{PoseError, Result, SessionError};
pub use landmark::{Landmark, BLAZEPOSE_LANDMARK_COUNT};
pub use reference::ReferencePose;
pub use session::{SessionController, SessionState, SessionStatus, SessionStatusHandle};
pub use similarity::{FrameScore, SimilarityScorer};
