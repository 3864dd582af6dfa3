use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_calibration_frames() -> usize {
    120
}

fn default_interval() -> (u64, u64) {
    (500, 1500)
}

fn default_results_path() -> PathBuf {
    PathBuf::from("results.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Trials per block.
    pub trials: usize,
    /// Frames sampled before the safety margin is derived.
    #[serde(default = "default_calibration_frames")]
    pub calibration_frames: usize,
    /// Blank gap between trials, drawn uniformly from this range.
    #[serde(default = "default_interval")]
    pub inter_trial_interval_ms: (u64, u64),
    /// TTF/OTF file for text displays; text is skipped without one.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            calibration_frames: default_calibration_frames(),
            inter_trial_interval_ms: default_interval(),
            font_path: None,
            results_path: default_results_path(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Missing file means defaults; a present but malformed file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            println!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).with_context(|| format!("writing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let config = SessionConfig {
            trials: 3,
            ..SessionConfig::default()
        };
        let path = std::env::temp_dir().join("stimkit-config-roundtrip.json");
        config.save(&path).unwrap();
        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded.trials, 3);
        assert_eq!(loaded.calibration_frames, config.calibration_frames);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("stimkit-config-does-not-exist.json");
        let loaded = SessionConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.trials, SessionConfig::default().trials);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let loaded: SessionConfig = serde_json::from_str(r#"{"trials": 42}"#).unwrap();
        assert_eq!(loaded.trials, 42);
        assert_eq!(loaded.calibration_frames, 120);
        assert!(loaded.font_path.is_none());
    }
}
