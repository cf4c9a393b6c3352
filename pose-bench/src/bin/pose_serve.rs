//! Pose scoring HTTP server.
//!
//! Live detections are replayed from a recorded landmark file and frames come
//! from a directory of images or a single repeated image.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pose_bench::capture::{CaptureDevice, ImageSequenceDevice, RepeatingDevice};
use pose_bench::{run_server, CommonServerArgs, FrameScoringPipeline, ReplayDetector, ServerState};
use pose_score::{ReferencePose, ScoringConfig, POSE_ANGLE_TRIPLES};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "HTTP server scoring a live pose against a reference posture",
    long_about = "Starts a timed scoring session on GET /video and streams annotated \
        frames as MJPEG. GET /result reports the running status or the session's \
        average pose score once it completes."
)]
struct Args {
    #[command(flatten)]
    server: CommonServerArgs,

    #[arg(
        long,
        conflicts_with = "reference_image",
        required_unless_present = "reference_image",
        help = "Saved reference pose JSON (as written by --save-reference)"
    )]
    reference: Option<PathBuf>,

    #[arg(
        long,
        requires = "reference_detections",
        help = "Reference posture image, run through the detector at startup"
    )]
    reference_image: Option<PathBuf>,

    #[arg(long, help = "Recorded detections for the reference image")]
    reference_detections: Option<PathBuf>,

    #[arg(long, help = "Write the reference pose to this file once built")]
    save_reference: Option<PathBuf>,

    #[arg(
        long,
        help = "Recorded landmark sets replayed as live detections",
        long_help = "JSON array with one entry per frame: an array of {x, y, z} \
            landmarks, or null for a frame without a detected pose. Entries wrap \
            around when the recording is shorter than the session."
    )]
    landmarks: PathBuf,

    #[arg(
        long,
        conflicts_with = "frame_image",
        required_unless_present = "frame_image",
        help = "Directory of image frames played back in file name order"
    )]
    frames_dir: Option<PathBuf>,

    #[arg(long, help = "Single image repeated as every frame")]
    frame_image: Option<PathBuf>,

    #[arg(long, default_value = "33", help = "Delay between frames in milliseconds")]
    frame_interval_ms: u64,

    #[arg(long, help = "End the repeated image stream after this many frames")]
    frame_limit: Option<u64>,

    #[arg(long, help = "Scoring configuration JSON")]
    scoring_config: Option<PathBuf>,
}

fn load_reference(args: &Args) -> Result<ReferencePose> {
    if let Some(path) = &args.reference {
        return ReferencePose::load_from_file(path)
            .with_context(|| format!("Failed to load reference pose {}", path.display()));
    }

    let (Some(image), Some(detections)) = (&args.reference_image, &args.reference_detections)
    else {
        anyhow::bail!("Either --reference or --reference-image with --reference-detections is required");
    };

    let mut detector = ReplayDetector::from_file(detections)
        .with_context(|| format!("Failed to load {}", detections.display()))?;
    ReferencePose::build(image, &mut detector, &POSE_ANGLE_TRIPLES)
        .with_context(|| format!("Failed to build reference pose from {}", image.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match &args.scoring_config {
        Some(path) => ScoringConfig::load_from_file(path)
            .with_context(|| format!("Failed to load scoring config {}", path.display()))?,
        None => ScoringConfig::default(),
    };
    info!("Scoring config: {config:?}");

    let reference = load_reference(&args)?;
    if let Some(path) = &args.save_reference {
        reference
            .save_to_file(path)
            .with_context(|| format!("Failed to save reference pose {}", path.display()))?;
        info!("Saved reference pose to {}", path.display());
    }

    let detector = ReplayDetector::from_file(&args.landmarks)
        .with_context(|| format!("Failed to load {}", args.landmarks.display()))?;
    let pipeline = FrameScoringPipeline::new(Arc::new(reference), Box::new(detector), &config)
        .context("Reference pose does not match the scored joints")?;

    let interval = Some(Duration::from_millis(args.frame_interval_ms)).filter(|d| !d.is_zero());
    let camera: Arc<dyn CaptureDevice> = match (&args.frames_dir, &args.frame_image) {
        (Some(dir), _) => Arc::new(ImageSequenceDevice::new(dir.clone(), interval)),
        (None, Some(path)) => Arc::new(
            RepeatingDevice::from_file(path, args.frame_limit, interval)
                .with_context(|| format!("Failed to load frame image {}", path.display()))?,
        ),
        (None, None) => anyhow::bail!("Either --frames-dir or --frame-image is required"),
    };
    info!("Capture device: {}", camera.name());

    let state = ServerState::new(camera, pipeline, &config, &args.server);
    run_server(state, &args.server).await
}
