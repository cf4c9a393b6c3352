//! Per-frame scoring and the capture loop of a session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use image::RgbImage;
use pose_score::angles::{self, AngleVector};
use pose_score::{
    AngleTriple, FrameScore, Landmark, PoseAnnotation, PoseAnnotator, PoseDetector, PoseError,
    ReferencePose, ScoringConfig, SessionController, SimilarityScorer, POSE_ANGLE_TRIPLES,
};
use tracing::{debug, error, info};

use crate::capture::FrameSource;
use crate::overlay;

/// Everything computed for a frame with a detected pose.
#[derive(Debug, Clone)]
pub struct ScoredPose {
    pub landmarks: Vec<Landmark>,
    pub angles: AngleVector,
    pub score: FrameScore,
    pub annotation: PoseAnnotation,
}

/// A captured frame after detection, scoring and overlay drawing.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub frame_number: u64,
    pub image: RgbImage,
    /// `None` when the detector found no pose; the frame passes through unscored.
    pub scored: Option<ScoredPose>,
}

/// What the capture loop did during one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub frames_scored: usize,
    pub frames_discarded: usize,
    /// Session result, `None` if the session was replaced before the loop ended.
    pub average: Option<f64>,
}

/// Lock the controller, recovering the guard if a previous holder panicked.
pub fn lock_controller(controller: &Mutex<SessionController>) -> MutexGuard<'_, SessionController> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scores live frames against a fixed reference pose.
pub struct FrameScoringPipeline {
    reference: Arc<ReferencePose>,
    triples: Vec<AngleTriple>,
    detector: Box<dyn PoseDetector>,
    scorer: SimilarityScorer,
    annotator: PoseAnnotator,
}

impl FrameScoringPipeline {
    pub fn new(
        reference: Arc<ReferencePose>,
        detector: Box<dyn PoseDetector>,
        config: &ScoringConfig,
    ) -> pose_score::Result<Self> {
        Self::with_triples(reference, detector, config, POSE_ANGLE_TRIPLES.to_vec())
    }

    /// Pipeline for scoring landmarks that were detected elsewhere.
    ///
    /// Its detector never finds a pose, so [`process_frame`](Self::process_frame)
    /// passes frames through unscored; use [`score_landmarks`](Self::score_landmarks).
    pub fn scoring_only(
        reference: Arc<ReferencePose>,
        config: &ScoringConfig,
    ) -> pose_score::Result<Self> {
        let no_detection = |_: &RgbImage| -> Option<Vec<Landmark>> { None };
        Self::new(reference, Box::new(no_detection), config)
    }

    /// Build a pipeline measuring a custom set of joint angles.
    ///
    /// Fails if the reference was extracted with a different set.
    pub fn with_triples(
        reference: Arc<ReferencePose>,
        detector: Box<dyn PoseDetector>,
        config: &ScoringConfig,
        triples: Vec<AngleTriple>,
    ) -> pose_score::Result<Self> {
        angles::check_triples(reference.landmarks().len(), &triples)?;
        if reference.angles().len() != triples.len() {
            return Err(PoseError::ShapeMismatch {
                what: "reference angle vector",
                expected: triples.len(),
                actual: reference.angles().len(),
            });
        }

        Ok(Self {
            reference,
            triples,
            detector,
            scorer: SimilarityScorer::new(config),
            annotator: PoseAnnotator::from_config(config),
        })
    }

    pub fn reference(&self) -> &ReferencePose {
        &self.reference
    }

    /// Score one detected landmark set. Pure: no detector, no drawing.
    pub fn score_landmarks(&self, landmarks: Vec<Landmark>) -> pose_score::Result<ScoredPose> {
        let angles = angles::extract(&landmarks, &self.triples)?;
        let score = self.scorer.score(&landmarks, &angles, &self.reference)?;
        let joints = angles::joint_positions(&landmarks, &self.triples)?;
        let annotation = self
            .annotator
            .annotate(&angles, self.reference.angles(), &joints);

        Ok(ScoredPose {
            landmarks,
            angles,
            score,
            annotation,
        })
    }

    /// Detect, score and draw the overlay on one frame.
    pub fn process_frame(
        &mut self,
        frame_number: u64,
        mut image: RgbImage,
    ) -> pose_score::Result<ProcessedFrame> {
        let scored = match self.detector.detect(&image) {
            Some(landmarks) => {
                let scored = self.score_landmarks(landmarks)?;
                overlay::annotate_frame(
                    &mut image,
                    &scored.landmarks,
                    &scored.annotation,
                    scored.score.blended,
                );
                Some(scored)
            }
            None => {
                debug!("No pose detected in frame {frame_number}");
                None
            }
        };

        Ok(ProcessedFrame {
            frame_number,
            image,
            scored,
        })
    }

    /// Run the capture loop for the session currently running on `controller`.
    ///
    /// Frames are scored until the deadline passes, the session is stopped or
    /// replaced, or the source runs dry; the session is then stopped. The
    /// controller lock is only held briefly per frame and never while `sink`
    /// runs. A shape mismatch while scoring stops the session and is returned.
    /// The session is also stopped if the loop unwinds.
    pub fn run_session<F>(
        &mut self,
        source: &mut dyn FrameSource,
        controller: &Mutex<SessionController>,
        mut sink: F,
    ) -> pose_score::Result<SessionSummary>
    where
        F: FnMut(ProcessedFrame),
    {
        let session_id = lock_controller(controller).session_id();
        let mut guard = SessionGuard::new(controller, session_id);
        let mut frames_processed = 0u64;
        let mut frames_scored = 0usize;

        loop {
            {
                let controller = lock_controller(controller);
                if controller.session_id() != session_id || controller.should_stop(Instant::now())
                {
                    break;
                }
            }

            let Some(image) = source.next_frame() else {
                info!("Capture source exhausted after {frames_processed} frames");
                break;
            };

            let processed = match self.process_frame(frames_processed, image) {
                Ok(processed) => processed,
                Err(e) => {
                    error!("Aborting session {session_id} on frame {frames_processed}: {e}");
                    guard.finish();
                    return Err(e);
                }
            };

            if let Some(scored) = &processed.scored {
                let mut controller = lock_controller(controller);
                if controller.session_id() != session_id {
                    break;
                }
                if controller.record_frame(scored.score.blended) {
                    frames_scored += 1;
                }
            }

            sink(processed);
            frames_processed += 1;
        }

        let (average, frames_discarded) = guard.finish();
        Ok(SessionSummary {
            frames_processed,
            frames_scored,
            frames_discarded,
            average,
        })
    }
}

/// Stops the session a capture loop was started for on every exit path,
/// unwinding included.
struct SessionGuard<'a> {
    controller: &'a Mutex<SessionController>,
    session_id: u64,
    finished: Option<(Option<f64>, usize)>,
}

impl<'a> SessionGuard<'a> {
    fn new(controller: &'a Mutex<SessionController>, session_id: u64) -> Self {
        Self {
            controller,
            session_id,
            finished: None,
        }
    }

    /// Stop the session if it is still the one the loop was started for.
    /// Returns the result and the discarded frame count.
    fn finish(&mut self) -> (Option<f64>, usize) {
        if let Some(finished) = self.finished {
            return finished;
        }

        let mut controller = lock_controller(self.controller);
        let finished = if controller.session_id() != self.session_id {
            info!(
                "Session {} was replaced before its capture loop ended",
                self.session_id
            );
            (None, 0)
        } else {
            (controller.stop(), controller.discarded_frames())
        };
        self.finished = Some(finished);
        finished
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.finished.is_none() {
            error!(
                "Capture loop for session {} ended without finishing it",
                self.session_id
            );
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RepeatingSource;
    use crate::replay::ReplayDetector;
    use pose_score::angles::blazepose::*;
    use pose_score::{SessionStatus, Verdict, BLAZEPOSE_LANDMARK_COUNT};
    use std::time::Duration;

    fn standing_pose() -> Vec<Landmark> {
        let mut landmarks: Vec<Landmark> = (0..BLAZEPOSE_LANDMARK_COUNT)
            .map(|i| Landmark::new(0.5, 0.1 + i as f64 / 100.0, -0.1))
            .collect();
        landmarks[LEFT_SHOULDER] = Landmark::planar(0.4, 0.3);
        landmarks[RIGHT_SHOULDER] = Landmark::planar(0.6, 0.3);
        landmarks[LEFT_ELBOW] = Landmark::planar(0.3, 0.4);
        landmarks[RIGHT_ELBOW] = Landmark::planar(0.7, 0.4);
        landmarks[LEFT_WRIST] = Landmark::planar(0.3, 0.2);
        landmarks[RIGHT_WRIST] = Landmark::planar(0.7, 0.2);
        landmarks[LEFT_HIP] = Landmark::planar(0.45, 0.6);
        landmarks[RIGHT_HIP] = Landmark::planar(0.55, 0.6);
        landmarks[LEFT_KNEE] = Landmark::planar(0.45, 0.75);
        landmarks[RIGHT_KNEE] = Landmark::planar(0.55, 0.75);
        landmarks[LEFT_ANKLE] = Landmark::planar(0.45, 0.9);
        landmarks[RIGHT_ANKLE] = Landmark::planar(0.55, 0.9);
        landmarks
    }

    fn pipeline(detector: ReplayDetector) -> FrameScoringPipeline {
        let reference =
            ReferencePose::from_landmarks(standing_pose(), &POSE_ANGLE_TRIPLES).unwrap();
        FrameScoringPipeline::new(
            Arc::new(reference),
            Box::new(detector),
            &ScoringConfig::default(),
        )
        .unwrap()
    }

    fn running_controller() -> Mutex<SessionController> {
        let mut controller = SessionController::new();
        controller.start(Duration::from_secs(60)).unwrap();
        Mutex::new(controller)
    }

    #[test]
    fn test_identical_pose_scores_100() {
        let pipeline = pipeline(ReplayDetector::new(Vec::new()));
        let scored = pipeline.score_landmarks(standing_pose()).unwrap();

        assert_eq!(scored.score.blended, 100.0);
        assert_eq!(scored.angles, pipeline.reference().angles());
        assert_eq!(scored.annotation.verdict, Verdict::Perfect);
        assert!(scored.annotation.markers.is_empty());
    }

    #[test]
    fn test_bent_knee_flagged() {
        let pipeline = pipeline(ReplayDetector::new(Vec::new()));
        let mut live = standing_pose();
        // Fold the right shin up behind the thigh
        live[RIGHT_ANKLE] = Landmark::planar(0.55, 0.62);
        live[RIGHT_KNEE] = Landmark::planar(0.65, 0.7);

        let scored = pipeline.score_landmarks(live.clone()).unwrap();
        assert_eq!(scored.annotation.verdict, Verdict::Correcting);
        assert!(scored.annotation.error_joints.contains(&6));
        assert!(scored.annotation.markers.contains(&live[RIGHT_KNEE]));
    }

    #[test]
    fn test_session_over_frame_limit() {
        let mut pipeline = pipeline(ReplayDetector::constant(standing_pose()));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(64, 64), Some(5), None);

        let mut frames = Vec::new();
        let summary = pipeline
            .run_session(&mut source, &controller, |frame| frames.push(frame))
            .unwrap();

        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.frames_scored, 5);
        assert_eq!(summary.average, Some(100.0));
        assert_eq!(
            frames.iter().map(|f| f.frame_number).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(
            lock_controller(&controller).query_status(),
            SessionStatus::Completed { result: 100.0 }
        );
    }

    #[test]
    fn test_missed_detections_pass_through_unscored() {
        let mut pipeline = pipeline(ReplayDetector::new(vec![Some(standing_pose()), None]));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(32, 32), Some(4), None);

        let mut unscored = 0;
        let summary = pipeline
            .run_session(&mut source, &controller, |frame| {
                if frame.scored.is_none() {
                    unscored += 1;
                    assert!(frame.image.pixels().all(|p| p.0 == [0, 0, 0]));
                }
            })
            .unwrap();

        assert_eq!(unscored, 2);
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.frames_scored, 2);
        assert_eq!(lock_controller(&controller).frames_recorded(), 2);
    }

    #[test]
    fn test_topology_change_aborts_session() {
        let short: Vec<Landmark> = standing_pose().into_iter().take(17).collect();
        let mut pipeline = pipeline(ReplayDetector::constant(short));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(16, 16), Some(3), None);

        let mut sunk = 0;
        let result = pipeline.run_session(&mut source, &controller, |_| sunk += 1);

        assert!(matches!(
            result,
            Err(PoseError::ShapeMismatch {
                expected: 29,
                actual: 17,
                ..
            })
        ));
        assert_eq!(sunk, 0);
        assert_eq!(
            lock_controller(&controller).query_status(),
            SessionStatus::Completed { result: 0.0 }
        );
    }

    #[test]
    fn test_non_finite_scores_discarded() {
        let broken = vec![Landmark::new(f64::NAN, f64::NAN, f64::NAN); BLAZEPOSE_LANDMARK_COUNT];
        let mut pipeline = pipeline(ReplayDetector::new(vec![
            Some(standing_pose()),
            Some(broken),
        ]));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(16, 16), Some(2), None);

        let summary = pipeline
            .run_session(&mut source, &controller, |_| {})
            .unwrap();

        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_scored, 1);
        assert_eq!(summary.frames_discarded, 1);
        assert_eq!(summary.average, Some(100.0));
    }

    #[test]
    fn test_elapsed_deadline_ends_loop() {
        let mut pipeline = pipeline(ReplayDetector::constant(standing_pose()));
        let mut controller = SessionController::new();
        controller.start(Duration::ZERO).unwrap();
        let controller = Mutex::new(controller);
        let mut source = RepeatingSource::new(RgbImage::new(8, 8), None, None);

        let summary = pipeline
            .run_session(&mut source, &controller, |_| {})
            .unwrap();

        assert_eq!(summary.frames_processed, 0);
        assert_eq!(summary.average, Some(0.0));
    }

    #[test]
    fn test_replaced_session_left_alone() {
        let mut pipeline = pipeline(ReplayDetector::constant(standing_pose()));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(8, 8), None, None);

        let summary = pipeline
            .run_session(&mut source, &controller, |_| {
                let mut controller = lock_controller(&controller);
                controller.stop();
                controller.start(Duration::from_secs(60)).unwrap();
            })
            .unwrap();

        assert_eq!(summary.frames_processed, 1);
        assert_eq!(summary.average, None);
        let controller = lock_controller(&controller);
        assert_eq!(controller.query_status(), SessionStatus::Running);
        assert!(controller.scores().is_empty());
    }

    #[test]
    fn test_panicking_loop_still_stops_session() {
        let mut pipeline = pipeline(ReplayDetector::constant(standing_pose()));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(8, 8), None, None);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pipeline.run_session(&mut source, &controller, |_| panic!("sink failed"))
        }));

        assert!(outcome.is_err());
        // The one frame scored before the panic made it into the result
        assert_eq!(
            lock_controller(&controller).query_status(),
            SessionStatus::Completed { result: 100.0 }
        );
    }

    #[test]
    fn test_panicking_loop_leaves_replacement_session_alone() {
        let mut pipeline = pipeline(ReplayDetector::constant(standing_pose()));
        let controller = running_controller();
        let mut source = RepeatingSource::new(RgbImage::new(8, 8), None, None);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pipeline.run_session(&mut source, &controller, |_| {
                {
                    let mut controller = lock_controller(&controller);
                    controller.stop();
                    controller.start(Duration::from_secs(60)).unwrap();
                }
                panic!("sink failed");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(
            lock_controller(&controller).query_status(),
            SessionStatus::Running
        );
    }

    #[test]
    fn test_scoring_only_pipeline_never_detects() {
        let reference =
            ReferencePose::from_landmarks(standing_pose(), &POSE_ANGLE_TRIPLES).unwrap();
        let mut pipeline =
            FrameScoringPipeline::scoring_only(Arc::new(reference), &ScoringConfig::default())
                .unwrap();

        let frame = pipeline.process_frame(0, RgbImage::new(4, 4)).unwrap();
        assert!(frame.scored.is_none());
        assert_eq!(
            pipeline.score_landmarks(standing_pose()).unwrap().score.blended,
            100.0
        );
    }

    #[test]
    fn test_reference_with_wrong_angle_count_rejected() {
        let reference = ReferencePose::from_parts(standing_pose(), vec![90.0; 3]);
        let result = FrameScoringPipeline::new(
            Arc::new(reference),
            Box::new(ReplayDetector::new(Vec::new())),
            &ScoringConfig::default(),
        );
        assert!(matches!(
            result,
            Err(PoseError::ShapeMismatch {
                expected: 8,
                actual: 3,
                ..
            })
        ));
    }
}
