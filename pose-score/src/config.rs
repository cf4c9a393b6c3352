//! Scoring configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for scoring and session timing.
///
/// Missing fields fall back to their defaults when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// A joint is flagged when its live angle is more than this many degrees
    /// below the reference angle.
    pub angle_tolerance_deg: f64,
    /// Decimal places the mean cosine similarity is rounded to before the
    /// distance transform.
    pub point_distance_decimals: u32,
    /// Session length used when a start request does not name one.
    pub default_session_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            angle_tolerance_deg: 15.0,
            point_distance_decimals: 2,
            default_session_secs: 10,
        }
    }
}

impl ScoringConfig {
    pub fn default_session_duration(&self) -> Duration {
        Duration::from_secs(self.default_session_secs)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.angle_tolerance_deg, 15.0);
        assert_eq!(config.point_distance_decimals, 2);
        assert_eq!(config.default_session_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScoringConfig = serde_json::from_str(r#"{"angle_tolerance_deg": 20.0}"#).unwrap();
        assert_eq!(config.angle_tolerance_deg, 20.0);
        assert_eq!(config.point_distance_decimals, 2);
        assert_eq!(config.default_session_secs, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.json");

        let config = ScoringConfig {
            angle_tolerance_deg: 10.0,
            point_distance_decimals: 3,
            default_session_secs: 30,
        };
        config.save_to_file(&path).unwrap();

        assert_eq!(ScoringConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScoringConfig::load_from_file(&dir.path().join("nope.json")).is_err());
    }
}
