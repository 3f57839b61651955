// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GestureMouseError {
    #[error("camera error: {0}")]
    Camera(String),

    #[error("landmark detector error: {0}")]
    Detector(String),

    #[error("expected 21 hand landmarks, got {0}")]
    LandmarkCount(usize),

    #[error("mouse backend error: {0}")]
    Mouse(String),

    #[error("screen capture failed: {0}")]
    ScreenCapture(String),

    #[error("invalid settings: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, GestureMouseError>;
