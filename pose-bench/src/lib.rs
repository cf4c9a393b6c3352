//! Pose scoring bench: capture sources, the per-frame scoring pipeline,
//! overlay drawing and the HTTP session server with MJPEG streaming.

pub mod capture;
pub mod mjpeg;
pub mod overlay;
pub mod pipeline;
pub mod replay;
pub mod server;

pub use capture::{CaptureDevice, CaptureError, FrameSource};
pub use pipeline::{FrameScoringPipeline, ProcessedFrame, ScoredPose, SessionSummary};
pub use replay::ReplayDetector;
pub use server::{run_server, CommonServerArgs, ServerState};
