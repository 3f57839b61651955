// src/video.rs - Webcam capture
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GestureMouseError;

pub trait FrameSource {
    fn read_frame(&mut self) -> Result<RgbImage>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Mirror frames so moving the hand right moves the cursor right.
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            mirror: true,
        }
    }
}

pub struct CameraSource {
    camera: Camera,
    mirror: bool,
}

impl CameraSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        debug!(index = config.index, "Opening camera");

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(config.index), requested)
            .map_err(|e| GestureMouseError::Camera(format!("failed to open camera {}: {}", config.index, e)))?;

        camera
            .open_stream()
            .map_err(|e| GestureMouseError::Camera(format!("failed to open camera stream: {}", e)))?;

        let resolution = camera.resolution();
        info!(
            "Camera {} streaming at {}x{} @ {} fps",
            config.index,
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );

        Ok(Self {
            camera,
            mirror: config.mirror,
        })
    }
}

impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| GestureMouseError::Camera(format!("failed to capture frame: {}", e)))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| GestureMouseError::Camera(format!("failed to decode frame: {}", e)))?;

        Ok(prepare_frame(decoded, self.mirror))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
    }
}

pub fn prepare_frame(frame: RgbImage, mirror: bool) -> RgbImage {
    if mirror {
        image::imageops::flip_horizontal(&frame)
    } else {
        frame
    }
}

/// Lists the cameras the platform backend can see.
pub fn list_cameras() -> Result<Vec<String>> {
    let cameras = nokhwa::query(ApiBackend::Auto).context("Failed to query cameras")?;
    let names: Vec<String> = cameras.iter().map(|c| c.human_name()).collect();

    info!("Found {} camera(s)", names.len());
    for (i, name) in names.iter().enumerate() {
        info!("  [{}] {}", i, name);
    }

    Ok(names)
}
