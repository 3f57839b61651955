// src/settings.rs - Persisted application settings
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GestureMouseError;
use crate::mediapipe_bridge::DetectorConfig;
use crate::mouse::ActionConfig;
use crate::tracking::TrackerConfig;
use crate::video::CameraConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub actions: ActionConfig,
    /// Run without the preview window.
    pub headless: bool,
    /// Write a CSV of every frame's gesture when the session ends.
    pub record_session: bool,
    pub session_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
            tracker: TrackerConfig::default(),
            actions: ActionConfig::default(),
            headless: false,
            record_session: false,
            session_dir: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("GestureMouse")))
                .unwrap_or_else(|| PathBuf::from("./sessions")),
        }
    }
}

impl AppSettings {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "gesturemouse", "GestureMouse")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Reads settings from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = serde_json::from_str(&raw)
            .map_err(|e| GestureMouseError::Settings(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()
            .ok_or_else(|| GestureMouseError::Settings("no config directory on this platform".into()))?;
        self.save_to(&path)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.tracker.thresholds;
        if t.bent_angle < 0.0 || t.straight_angle > 180.0 || t.bent_angle > t.straight_angle {
            return Err(GestureMouseError::Settings(format!(
                "angle thresholds must satisfy 0 <= bent ({}) <= straight ({}) <= 180",
                t.bent_angle, t.straight_angle
            ))
            .into());
        }
        if !(0.0..=1000.0).contains(&t.pinch_distance) {
            return Err(GestureMouseError::Settings(format!(
                "pinch distance {} outside 0..=1000",
                t.pinch_distance
            ))
            .into());
        }
        if self.actions.vertical_scale <= 0.0 {
            return Err(GestureMouseError::Settings("vertical scale must be positive".into()).into());
        }
        if self.detector.command.is_empty() {
            return Err(GestureMouseError::Settings("detector command is empty".into()).into());
        }
        Ok(())
    }
}
