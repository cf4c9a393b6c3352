//! MJPEG streaming of annotated session frames.
//!
//! Each frame is sent as a JPEG part of a `multipart/x-mixed-replace` response,
//! which browsers render natively in an `<img>` tag. A broadcaster lives exactly
//! as long as one session: when the capture loop drops it, every subscriber's
//! stream ends and the HTTP response completes.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use image::RgbImage;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Boundary string used to separate MJPEG frames.
/// Must be unique enough to not appear in JPEG data.
pub const MJPEG_BOUNDARY: &str = "pose_frame_3b9e51a0";

/// An encoded frame ready for streaming.
#[derive(Clone)]
pub struct MjpegFrame {
    pub jpeg_data: Bytes,
    /// Position of the frame in the session
    pub frame_number: u64,
}

/// Fans session frames out to every connected HTTP client.
///
/// Slow clients that fall more than `capacity` frames behind skip ahead.
pub struct MjpegBroadcaster {
    tx: broadcast::Sender<MjpegFrame>,
}

impl MjpegBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a frame. Returns the number of subscribers it reached.
    pub fn publish(&self, frame: MjpegFrame) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> MjpegSubscriber {
        MjpegSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Multipart body chunk for one frame: boundary, part headers, JPEG, CRLF.
pub fn mjpeg_part(frame: &MjpegFrame) -> Bytes {
    let head = format!(
        "--{MJPEG_BOUNDARY}\r\n\
         Content-Type: image/jpeg\r\n\
         Content-Length: {len}\r\n\
         \r\n",
        len = frame.jpeg_data.len()
    );

    let mut bytes = Vec::with_capacity(head.len() + frame.jpeg_data.len() + 2);
    bytes.extend_from_slice(head.as_bytes());
    bytes.extend_from_slice(&frame.jpeg_data);
    bytes.extend_from_slice(b"\r\n");
    Bytes::from(bytes)
}

/// One client's view of a session stream.
pub struct MjpegSubscriber {
    rx: broadcast::Receiver<MjpegFrame>,
}

impl MjpegSubscriber {
    /// Stream frames as a `multipart/x-mixed-replace` response.
    ///
    /// The body ends once the broadcaster is dropped.
    pub fn into_response(self) -> Response {
        // Lagged receivers skip the frames they missed
        let stream = BroadcastStream::new(self.rx).filter_map(|result| {
            result
                .ok()
                .map(|frame| Ok::<_, std::convert::Infallible>(mjpeg_part(&frame)))
        });

        (
            StatusCode::OK,
            [
                (
                    header::CONTENT_TYPE,
                    format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"),
                ),
                (
                    header::CACHE_CONTROL,
                    "no-cache, no-store, must-revalidate".to_string(),
                ),
                (header::PRAGMA, "no-cache".to_string()),
                (header::EXPIRES, "0".to_string()),
            ],
            Body::from_stream(stream),
        )
            .into_response()
    }
}

/// Encode an RGB frame as JPEG.
pub fn encode_rgb_jpeg(image: &RgbImage, quality: u8) -> Option<Bytes> {
    let mut jpeg_bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, quality);
    encoder.encode_image(image).ok()?;
    Some(Bytes::from(jpeg_bytes))
}
