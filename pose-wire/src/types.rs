//! API payload types.

use serde::{Deserialize, Serialize};

/// Response of `GET /result`.
///
/// Serialized with a `status` tag:
/// `{"status":"running"}`, `{"status":"no_session"}` or
/// `{"status":"completed","average_pose_score":87.25}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionResult {
    Running,
    NoSession,
    Completed {
        /// Mean blended score, rounded to 2 decimals.
        average_pose_score: f64,
    },
}

impl SessionResult {
    /// Build a completed result, rounding the score to 2 decimals.
    pub fn completed(average: f64) -> Self {
        Self::Completed {
            average_pose_score: (average * 100.0).round() / 100.0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Response of `POST /stop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopResponse {
    /// Whether a running session was ended by this request
    pub stopped: bool,
    pub result: SessionResult,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthInfo {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_json_shapes() {
        assert_eq!(
            serde_json::to_string(&SessionResult::Running).unwrap(),
            r#"{"status":"running"}"#
        );
        assert_eq!(
            serde_json::to_string(&SessionResult::NoSession).unwrap(),
            r#"{"status":"no_session"}"#
        );
        assert_eq!(
            serde_json::to_string(&SessionResult::completed(90.0)).unwrap(),
            r#"{"status":"completed","average_pose_score":90.0}"#
        );
    }

    #[test]
    fn test_completed_rounds_to_two_decimals() {
        assert_eq!(
            SessionResult::completed(87.34567),
            SessionResult::Completed {
                average_pose_score: 87.35
            }
        );
    }

    #[test]
    fn test_parse_completed() {
        let parsed: SessionResult =
            serde_json::from_str(r#"{"status":"completed","average_pose_score":72.5}"#).unwrap();
        assert_eq!(
            parsed,
            SessionResult::Completed {
                average_pose_score: 72.5
            }
        );
        assert!(!parsed.is_running());
    }
}
