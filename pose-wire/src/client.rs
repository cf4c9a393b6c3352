//! HTTP client for the pose scoring server API.

use serde::de::DeserializeOwned;

use crate::types::{HealthInfo, SessionResult, StopResponse};

/// Error type for pose server requests.
#[derive(Debug, thiserror::Error)]
pub enum PoseClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned an error status
    #[error("Server error (status {status}): {message}")]
    ServerError { status: u16, message: String },
}

impl From<reqwest::Error> for PoseClientError {
    fn from(err: reqwest::Error) -> Self {
        PoseClientError::Http(err.to_string())
    }
}

/// Client for the session API of `pose_serve`.
#[derive(Debug, Clone)]
pub struct PoseServerClient {
    base_url: String,
    http: reqwest::Client,
}

impl PoseServerClient {
    /// Create a client for the server at `base_url` (e.g. "http://localhost:8000").
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL that starts a session and streams its annotated frames.
    ///
    /// Point an `<img>` tag at it, or read it with any HTTP client.
    pub fn video_url(&self, duration_secs: Option<u64>) -> String {
        match duration_secs {
            Some(secs) => format!("{}/video?duration={secs}", self.base_url),
            None => format!("{}/video", self.base_url),
        }
    }

    async fn check<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PoseClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(PoseClientError::ServerError {
                status: status.as_u16(),
                message: response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PoseClientError::Parse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PoseClientError> {
        let url = format!("{}{}", self.base_url, path);
        Self::check(self.http.get(&url).send().await?).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, PoseClientError> {
        let url = format!("{}{}", self.base_url, path);
        Self::check(self.http.post(&url).send().await?).await
    }

    /// Poll the current session status.
    pub async fn get_result(&self) -> Result<SessionResult, PoseClientError> {
        self.get("/result").await
    }

    /// End the running session early. Safe to call when nothing is running.
    pub async fn stop_session(&self) -> Result<StopResponse, PoseClientError> {
        self.post("/stop").await
    }

    pub async fn health(&self) -> Result<HealthInfo, PoseClientError> {
        self.get("/health").await
    }
}
