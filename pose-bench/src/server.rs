//! HTTP session API.
//!
//! - `GET /video?duration=<secs>` starts a session and streams annotated
//!   frames as MJPEG until it ends
//! - `GET /result` reports the session status
//! - `POST /stop` ends the running session early
//! - `GET /health`
//!
//! CORS is permissive so a browser frontend served from another origin can
//! poll `/result`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Args;
use pose_score::{
    ScoringConfig, SessionController, SessionState, SessionStatus, SessionStatusHandle,
};
use pose_wire::{HealthInfo, SessionResult, StopResponse};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::capture::CaptureDevice;
use crate::mjpeg::{encode_rgb_jpeg, MjpegBroadcaster, MjpegFrame};
use crate::pipeline::{lock_controller, FrameScoringPipeline};

/// Server options shared by every pose server binary.
#[derive(Args, Debug, Clone)]
pub struct CommonServerArgs {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_address: String,

    /// HTTP server port
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// JPEG quality of streamed frames (1-100)
    #[arg(long, default_value = "80", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Frames buffered per stream client before it starts skipping
    #[arg(long, default_value = "4")]
    pub stream_buffer: usize,
}

/// Shared state behind every route.
pub struct ServerState {
    camera: Arc<dyn CaptureDevice>,
    pipeline: Arc<Mutex<FrameScoringPipeline>>,
    controller: Arc<Mutex<SessionController>>,
    status: SessionStatusHandle,
    default_duration: Duration,
    jpeg_quality: u8,
    stream_buffer: usize,
}

impl ServerState {
    pub fn new(
        camera: Arc<dyn CaptureDevice>,
        pipeline: FrameScoringPipeline,
        config: &ScoringConfig,
        args: &CommonServerArgs,
    ) -> Self {
        let controller = SessionController::new();
        let status = controller.subscribe();
        Self {
            camera,
            pipeline: Arc::new(Mutex::new(pipeline)),
            controller: Arc::new(Mutex::new(controller)),
            status,
            default_duration: config.default_session_duration(),
            jpeg_quality: args.jpeg_quality,
            stream_buffer: args.stream_buffer,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.current()
    }
}

/// Map the published session status onto the `/result` payload.
pub fn session_result(status: SessionStatus) -> SessionResult {
    match status {
        SessionStatus::Idle => SessionResult::NoSession,
        SessionStatus::Running => SessionResult::Running,
        SessionStatus::Completed { result } => SessionResult::completed(result),
    }
}

/// Longest session `/video` accepts.
pub const MAX_SESSION_SECS: u64 = 3600;

/// Session length for a `/video` request, `None` past [`MAX_SESSION_SECS`].
pub fn requested_duration(requested: Option<u64>, default: Duration) -> Option<Duration> {
    match requested {
        Some(secs) if secs > MAX_SESSION_SECS => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(default),
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoParams {
    /// Session length in seconds
    pub duration: Option<u64>,
}

async fn video_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<VideoParams>,
) -> Response {
    let Some(duration) = requested_duration(params.duration, state.default_duration) else {
        return (
            StatusCode::BAD_REQUEST,
            format!("duration must be at most {MAX_SESSION_SECS} seconds"),
        )
            .into_response();
    };

    let started = lock_controller(&state.controller).start(duration);
    if let Err(e) = started {
        return (StatusCode::CONFLICT, e.to_string()).into_response();
    }

    let mut source = match state.camera.open() {
        Ok(source) => source,
        Err(e) => {
            warn!("Failed to open capture device {}: {e}", state.camera.name());
            lock_controller(&state.controller).abort();
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Capture device unavailable: {e}"),
            )
                .into_response();
        }
    };

    info!(
        "Session started on {} for {}s",
        state.camera.name(),
        duration.as_secs()
    );

    let broadcaster = MjpegBroadcaster::new(state.stream_buffer);
    let subscriber = broadcaster.subscribe();
    let pipeline = state.pipeline.clone();
    let controller = state.controller.clone();
    let quality = state.jpeg_quality;

    let capture = tokio::task::spawn_blocking(move || {
        let mut pipeline = pipeline.lock().unwrap_or_else(PoisonError::into_inner);
        let result = pipeline.run_session(source.as_mut(), &controller, |frame| {
            match encode_rgb_jpeg(&frame.image, quality) {
                Some(jpeg_data) => {
                    broadcaster.publish(MjpegFrame {
                        jpeg_data,
                        frame_number: frame.frame_number,
                    });
                }
                None => warn!("Failed to encode frame {}", frame.frame_number),
            }
        });

        match result {
            Ok(summary) => info!(
                "Session loop finished: {} frames, {} scored, {} discarded",
                summary.frames_processed, summary.frames_scored, summary.frames_discarded
            ),
            Err(e) => error!("Session loop failed: {e}"),
        }
        // Dropping the broadcaster here ends every client's stream
    });
    tokio::spawn(async move {
        if let Err(e) = capture.await {
            error!("Session capture task failed: {e}");
        }
    });

    subscriber.into_response()
}

async fn result_handler(State(state): State<Arc<ServerState>>) -> Json<SessionResult> {
    Json(session_result(state.status()))
}

async fn stop_handler(State(state): State<Arc<ServerState>>) -> Json<StopResponse> {
    let mut controller = lock_controller(&state.controller);
    let stopped = controller.state() == SessionState::Running;
    controller.stop();
    if stopped {
        info!("Session stopped on request");
    }

    Json(StopResponse {
        stopped,
        result: session_result(controller.query_status()),
    })
}

async fn health_handler() -> Json<HealthInfo> {
    Json(HealthInfo {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/video", get(video_handler))
        .route("/result", get(result_handler))
        .route("/stop", post(stop_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the session API on an already bound listener.
pub async fn serve(listener: TcpListener, state: ServerState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Pose scoring server listening on http://{addr}");
    info!("  GET  /video?duration=<secs>  - start a session and stream MJPEG");
    info!("  GET  /result                 - session status");
    info!("  POST /stop                   - end the running session");

    axum::serve(listener, router(Arc::new(state)))
        .await
        .context("HTTP server failed")
}

pub async fn run_server(state: ServerState, args: &CommonServerArgs) -> anyhow::Result<()> {
    let addr = format!("{}:{}", args.bind_address, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    serve(listener, state).await
}
