// src/mediapipe_bridge.rs - Hand landmark detection through a MediaPipe sidecar process
//
// Frames go to the sidecar's stdin as a 12 byte little-endian header
// (width, height, channels) followed by raw RGB bytes. The sidecar answers
// each frame with one JSON line.
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};
use image::RgbImage;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GestureMouseError;
use crate::landmarks::{HandLandmarks, LANDMARK_COUNT};

/// Anything that can turn a frame into at most one tracked hand.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<HandLandmarks>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Program and arguments that start the sidecar.
    pub command: Vec<String>,
    pub model_complexity: u8,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
    pub max_num_hands: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string(), "scripts/hand_landmarker.py".to_string()],
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            max_num_hands: 1,
        }
    }
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f64,
    y: f64,
    #[serde(default)]
    #[allow(dead_code)]
    z: f64,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    score: f64,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionResponse {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

pub struct MediaPipeBridge {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    config: DetectorConfig,
}

impl MediaPipeBridge {
    pub fn spawn(config: DetectorConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| GestureMouseError::Detector("detector command is empty".into()))?;

        info!(command = ?config.command, "Starting hand landmarker sidecar");

        let mut process = Command::new(program)
            .args(args)
            .arg("--model-complexity")
            .arg(config.model_complexity.to_string())
            .arg("--min-detection-confidence")
            .arg(config.min_detection_confidence.to_string())
            .arg("--min-tracking-confidence")
            .arg(config.min_tracking_confidence.to_string())
            .arg("--max-num-hands")
            .arg(config.max_num_hands.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start hand landmarker `{}`", program))?;

        let stdin = process.stdin.take().context("Sidecar stdin unavailable")?;
        let stdout = process.stdout.take().context("Sidecar stdout unavailable")?;
        let mut stdout = BufReader::new(stdout);

        if let Err(e) = wait_for_ready(&mut stdout) {
            let _ = process.kill();
            let _ = process.wait();
            return Err(e);
        }

        info!("Hand landmarker ready");

        Ok(Self {
            process,
            stdin,
            stdout,
            config,
        })
    }

    fn send_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let header = encode_header(frame.width(), frame.height());
        self.stdin.write_all(&header)?;
        self.stdin.write_all(frame.as_raw())?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl LandmarkDetector for MediaPipeBridge {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<HandLandmarks>> {
        self.send_frame(frame).context("Failed to send frame to hand landmarker")?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(GestureMouseError::Detector("sidecar closed its output".into()).into());
        }

        parse_response(&line, self.config.min_detection_confidence)
    }
}

impl Drop for MediaPipeBridge {
    fn drop(&mut self) {
        debug!("Stopping hand landmarker sidecar");
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

fn encode_header(width: u32, height: u32) -> [u8; 12] {
    let mut header = [0u8; 12];
    header[0..4].copy_from_slice(&width.to_le_bytes());
    header[4..8].copy_from_slice(&height.to_le_bytes());
    header[8..12].copy_from_slice(&3u32.to_le_bytes());
    header
}

/// Reads the sidecar's first line, which must be `READY`.
fn wait_for_ready(stdout: &mut impl BufRead) -> Result<()> {
    let mut ready = String::new();
    stdout
        .read_line(&mut ready)
        .context("Failed to read hand landmarker handshake")?;
    if ready.trim() != "READY" {
        return Err(GestureMouseError::Detector(format!(
            "sidecar did not signal READY, got {:?}",
            ready.trim()
        ))
        .into());
    }
    Ok(())
}

/// Picks the first hand that clears `min_score` and carries a full landmark set.
fn parse_response(line: &str, min_score: f64) -> Result<Option<HandLandmarks>> {
    let response: DetectionResponse = serde_json::from_str(line.trim())
        .map_err(|e| GestureMouseError::Detector(format!("bad response {:?}: {}", line.trim(), e)))?;

    if let Some(error) = response.error {
        warn!("Hand landmarker reported: {}", error);
        return Ok(None);
    }

    for hand in response.hands {
        if hand.score < min_score {
            debug!(score = hand.score, "Skipping low-confidence hand");
            continue;
        }
        if hand.landmarks.len() != LANDMARK_COUNT {
            warn!("Expected {} landmarks, got {}", LANDMARK_COUNT, hand.landmarks.len());
            continue;
        }

        let points: Vec<Vector2<f64>> = hand
            .landmarks
            .iter()
            .map(|lm| Vector2::new(lm.x, lm.y))
            .collect();

        return Ok(Some(HandLandmarks::from_points(&points, hand.score, hand.handedness)?));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(score: f64, count: usize) -> String {
        let lms: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0}}"#, i as f64 / 100.0))
            .collect();
        format!(
            r#"{{"handedness":"Right","score":{},"landmarks":[{}]}}"#,
            score,
            lms.join(",")
        )
    }

    #[test]
    fn header_layout() {
        let header = encode_header(640, 480);
        assert_eq!(&header[0..4], &640u32.to_le_bytes());
        assert_eq!(&header[4..8], &480u32.to_le_bytes());
        assert_eq!(&header[8..12], &3u32.to_le_bytes());
    }

    #[test]
    fn parses_first_confident_hand() {
        let line = format!(r#"{{"hands":[{},{}]}}"#, hand_json(0.4, 21), hand_json(0.9, 21));
        let hand = parse_response(&line, 0.7).unwrap().unwrap();
        assert_eq!(hand.score, 0.9);
        assert_eq!(hand.handedness, "Right");
        assert_eq!(hand.point(8).x, 0.08);
    }

    #[test]
    fn incomplete_hands_are_skipped() {
        let line = format!(r#"{{"hands":[{}]}}"#, hand_json(0.9, 20));
        assert!(parse_response(&line, 0.7).unwrap().is_none());
    }

    #[test]
    fn empty_and_error_responses_yield_no_hand() {
        assert!(parse_response(r#"{"hands":[]}"#, 0.7).unwrap().is_none());
        assert!(parse_response(r#"{"hands":[],"error":"decode failed"}"#, 0.7)
            .unwrap()
            .is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_response("not json", 0.7).is_err());
    }

    struct BrokenPipe;

    impl std::io::Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sidecar crashed"))
        }
    }

    #[test]
    fn handshake_requires_ready_line() {
        assert!(wait_for_ready(&mut std::io::Cursor::new("READY\n")).is_ok());
        assert!(wait_for_ready(&mut std::io::Cursor::new("Traceback ...\n")).is_err());
        assert!(wait_for_ready(&mut std::io::Cursor::new("")).is_err());
        assert!(wait_for_ready(&mut BufReader::new(BrokenPipe)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn silent_sidecar_fails_to_spawn() {
        let config = DetectorConfig {
            command: vec!["sh".into(), "-c".into(), "exit 0".into()],
            ..Default::default()
        };
        let err = MediaPipeBridge::spawn(config).err().expect("spawn should fail");
        assert!(err.to_string().contains("READY"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let config = DetectorConfig {
            command: Vec::new(),
            ..Default::default()
        };
        assert!(MediaPipeBridge::spawn(config).is_err());
    }
}
