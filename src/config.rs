//! Application-level configuration loading, including the point rates used
//! by the gamification ledger.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the host looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/studydeck.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "STUDYDECK_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Point rates applied when domain events are translated into activity rows.
    pub points: PointsConfig,
}

/// Point values awarded per domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsConfig {
    /// Points credited per full hour of completed study time.
    pub hourly_study_rate: u32,
    /// Flat award for finishing an exam.
    pub exam_finished: u32,
    /// Award per graded flashcard.
    pub card_reviewed: u32,
    /// Award per pool question answered outside exam mode.
    pub question_answered: u32,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            hourly_study_rate: 60,
            exam_finished: 20,
            card_reviewed: 1,
            question_answered: 2,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            points: PointsConfig::default(),
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    points: RawPoints,
}

/// JSON representation of the point rates section.
#[derive(Debug, Deserialize)]
struct RawPoints {
    hourly_study_rate: Option<u32>,
    exam_finished: Option<u32>,
    card_reviewed: Option<u32>,
    question_answered: Option<u32>,
}

impl Default for RawPoints {
    fn default() -> Self {
        Self {
            hourly_study_rate: None,
            exam_finished: None,
            card_reviewed: None,
            question_answered: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = PointsConfig::default();
        Self {
            points: PointsConfig {
                hourly_study_rate: value
                    .points
                    .hourly_study_rate
                    .unwrap_or(defaults.hourly_study_rate),
                exam_finished: value.points.exam_finished.unwrap_or(defaults.exam_finished),
                card_reviewed: value.points.card_reviewed.unwrap_or(defaults.card_reviewed),
                question_answered: value
                    .points
                    .question_answered
                    .unwrap_or(defaults.question_answered),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_raw_config_keeps_defaults_for_missing_rates() {
        let raw: RawConfig = serde_json::from_str(r#"{"points": {"hourly_study_rate": 90}}"#)
            .expect("valid raw config");
        let config: AppConfig = raw.into();
        assert_eq!(config.points.hourly_study_rate, 90);
        assert_eq!(config.points.exam_finished, PointsConfig::default().exam_finished);
    }

    #[test]
    fn empty_raw_config_matches_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").expect("valid raw config");
        let config: AppConfig = raw.into();
        assert_eq!(config.points, PointsConfig::default());
    }
}
