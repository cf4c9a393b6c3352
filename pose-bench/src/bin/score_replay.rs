//! Offline scoring of a recorded landmark file against a reference pose.
//!
//! Prints one line per recorded frame and the session average, the value the
//! server would report for a session that saw exactly these detections.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pose_bench::{FrameScoringPipeline, ReplayDetector};
use pose_score::{ReferencePose, ScoringConfig, SessionController, POSE_ANGLE_TRIPLES};
use pose_wire::SessionResult;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Score recorded landmarks against a reference pose")]
struct Args {
    #[arg(long, help = "Saved reference pose JSON")]
    reference: PathBuf,

    #[arg(long, help = "Recorded landmark sets, one entry per frame (null = no pose)")]
    landmarks: PathBuf,

    #[arg(long, help = "Scoring configuration JSON")]
    scoring_config: Option<PathBuf>,

    #[arg(long, help = "Print the final result as /result JSON")]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match &args.scoring_config {
        Some(path) => ScoringConfig::load_from_file(path)
            .with_context(|| format!("Failed to load scoring config {}", path.display()))?,
        None => ScoringConfig::default(),
    };

    let reference = ReferencePose::load_from_file(&args.reference)
        .with_context(|| format!("Failed to load reference pose {}", args.reference.display()))?;
    let frames = ReplayDetector::from_file(&args.landmarks)
        .with_context(|| format!("Failed to load {}", args.landmarks.display()))?
        .into_frames();

    let pipeline = FrameScoringPipeline::scoring_only(Arc::new(reference), &config)
        .context("Reference pose does not match the scored joints")?;

    let mut session = SessionController::new();
    session.start(Duration::MAX)?;

    for (frame_number, landmarks) in frames.into_iter().enumerate() {
        let Some(landmarks) = landmarks else {
            println!("{frame_number:>5}  no pose");
            continue;
        };

        let scored = pipeline
            .score_landmarks(landmarks)
            .with_context(|| format!("Failed to score frame {frame_number}"))?;
        session.record_frame(scored.score.blended);

        let errors: Vec<&str> = scored
            .annotation
            .error_joints
            .iter()
            .map(|&i| POSE_ANGLE_TRIPLES[i].name)
            .collect();
        println!(
            "{frame_number:>5}  score {:>6.2}  point {:.4}  angle {:.4}  {}  {}",
            scored.score.blended,
            scored.score.point_distance,
            scored.score.angle_distance,
            scored.annotation.verdict,
            errors.join(",")
        );
    }

    let average = session.stop().unwrap_or(0.0);
    info!(
        "{} frames scored, {} discarded",
        session.frames_recorded(),
        session.discarded_frames()
    );

    if args.json {
        println!("{}", serde_json::to_string(&SessionResult::completed(average))?);
    } else {
        println!("average pose score: {average:.2}");
    }
    Ok(())
}
