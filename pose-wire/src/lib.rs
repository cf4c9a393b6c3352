//! Wire types and HTTP client for the pose scoring server.
//!
//! Kept free of the scoring crate so lightweight consumers (dashboards, test
//! harnesses) can talk to the server without pulling in image processing.

mod client;
mod types;

pub use client::{PoseClientError, PoseServerClient};
pub use types::{HealthInfo, SessionResult, StopResponse};
