// src/tracking.rs - Per-frame hand tracking: detection, classification, fingertip smoothing
use std::collections::VecDeque;
use std::time::Instant;

use anyhow::Result;
use image::RgbImage;
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gesture::{Gesture, GestureClassifier, GestureThresholds, HandMeasurements};
use crate::landmarks::HandLandmarks;
use crate::mediapipe_bridge::LandmarkDetector;

const METRICS_WINDOW: usize = 30;

#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub detection_rate: f32,
    frame_times: VecDeque<f32>,
    frame_intervals: VecDeque<f32>,
    detections: VecDeque<bool>,
    last_frame: Option<Instant>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(METRICS_WINDOW),
            frame_intervals: VecDeque::with_capacity(METRICS_WINDOW),
            detections: VecDeque::with_capacity(METRICS_WINDOW),
            ..Default::default()
        }
    }

    /// Records a frame that started at `frame_start` and spent `processing_secs` in detection.
    /// The fps figure comes from the spacing between frame starts, so it includes camera waits.
    pub fn record(&mut self, frame_start: Instant, processing_secs: f32, detected: bool) {
        if let Some(last) = self.last_frame.replace(frame_start) {
            self.frame_intervals
                .push_front(frame_start.saturating_duration_since(last).as_secs_f32());
            if self.frame_intervals.len() > METRICS_WINDOW {
                self.frame_intervals.pop_back();
            }
        }
        self.frame_times.push_front(processing_secs);
        self.detections.push_front(detected);
        if self.frame_times.len() > METRICS_WINDOW {
            self.frame_times.pop_back();
            self.detections.pop_back();
        }

        self.avg_processing_time =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        let avg_interval = if self.frame_intervals.is_empty() {
            0.0
        } else {
            self.frame_intervals.iter().sum::<f32>() / self.frame_intervals.len() as f32
        };
        self.avg_fps = if avg_interval > 0.0 { 1.0 / avg_interval } else { 0.0 };
        self.detection_rate = self.detections.iter().filter(|d| **d).count() as f32
            / self.detections.len() as f32;
    }
}

/// Constant-velocity filter over a 2D point: state is [x, y, vx, vy].
pub struct KalmanFilter {
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    process_noise: Matrix4<f64>,
    measurement_noise: Matrix2<f64>,
    dt: f64,
    initialized: bool,
}

impl KalmanFilter {
    pub fn new(dt: f64, process_noise: f64, measurement_noise: f64) -> Self {
        let mut q = Matrix4::identity() * process_noise;
        q.fixed_view_mut::<2, 2>(2, 2).fill_diagonal(process_noise * 2.0);

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity(),
            process_noise: q,
            measurement_noise: Matrix2::identity() * measurement_noise,
            dt,
            initialized: false,
        }
    }

    pub fn predict(&mut self) {
        let mut f = Matrix4::identity();
        f.fixed_view_mut::<2, 2>(0, 2).fill_diagonal(self.dt);

        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise;
    }

    pub fn update(&mut self, measurement: Vector2<f64>) {
        // The first measurement seeds the state so the cursor does not glide in from (0, 0).
        if !self.initialized {
            self.state = Vector4::new(measurement.x, measurement.y, 0.0, 0.0);
            self.initialized = true;
            return;
        }

        let mut h = Matrix2x4::<f64>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;

        let y = measurement - h * self.state;
        let s = h * self.covariance * h.transpose() + self.measurement_noise;

        let Some(s_inv) = s.try_inverse() else {
            return;
        };
        let k = self.covariance * h.transpose() * s_inv;

        self.state += k * y;
        self.covariance = (Matrix4::identity() - k * h) * self.covariance;
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.state[0], self.state[1])
    }

    pub fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity();
        self.initialized = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub thresholds: GestureThresholds,
    pub smooth_cursor: bool,
    pub process_noise: f64,
    pub measurement_noise: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            thresholds: GestureThresholds::default(),
            smooth_cursor: true,
            process_noise: 0.01,
            measurement_noise: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackingResult {
    pub hand: Option<HandLandmarks>,
    pub measurements: Option<HandMeasurements>,
    pub gesture: Gesture,
    /// Index fingertip after smoothing, normalized.
    pub cursor_tip: Option<Vector2<f64>>,
    pub timestamp: f64,
}

impl Default for TrackingResult {
    fn default() -> Self {
        Self {
            hand: None,
            measurements: None,
            gesture: Gesture::None,
            cursor_tip: None,
            timestamp: 0.0,
        }
    }
}

pub struct GestureTracker {
    detector: Box<dyn LandmarkDetector>,
    classifier: GestureClassifier,
    tip_filter: KalmanFilter,
    config: TrackerConfig,
    metrics: PerformanceMetrics,
    started: Instant,
}

impl GestureTracker {
    pub fn new(detector: Box<dyn LandmarkDetector>, config: TrackerConfig) -> Self {
        Self {
            detector,
            classifier: GestureClassifier::new(config.thresholds.clone()),
            tip_filter: KalmanFilter::new(1.0 / 30.0, config.process_noise, config.measurement_noise),
            config,
            metrics: PerformanceMetrics::new(),
            started: Instant::now(),
        }
    }

    pub fn set_config(&mut self, config: TrackerConfig) {
        self.classifier.set_thresholds(config.thresholds.clone());
        self.tip_filter = KalmanFilter::new(1.0 / 30.0, config.process_noise, config.measurement_noise);
        self.config = config;
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn process_frame(&mut self, frame: &RgbImage) -> Result<TrackingResult> {
        let start = Instant::now();
        let hand = self.detector.detect(frame)?;

        let mut result = TrackingResult {
            timestamp: self.started.elapsed().as_secs_f64(),
            ..Default::default()
        };

        match hand {
            Some(hand) => {
                let measurements = HandMeasurements::of(&hand);
                result.gesture = self.classifier.classify_measurements(&measurements);
                result.measurements = Some(measurements);
                result.cursor_tip = Some(self.smooth_tip(hand.index_finger_tip()));

                debug!(
                    gesture = ?result.gesture,
                    index = measurements.index_angle,
                    middle = measurements.middle_angle,
                    dist = measurements.thumb_index_distance,
                    "Hand tracked"
                );
                result.hand = Some(hand);
            }
            None => {
                self.tip_filter.reset();
            }
        }

        self.metrics
            .record(start, start.elapsed().as_secs_f32(), result.hand.is_some());

        Ok(result)
    }

    fn smooth_tip(&mut self, tip: Vector2<f64>) -> Vector2<f64> {
        if !self.config.smooth_cursor {
            return tip;
        }
        self.tip_filter.predict();
        self.tip_filter.update(tip);
        self.tip_filter.position()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::tests::synthetic_hand;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays a fixed sequence of detections, then reports no hand.
    pub(crate) struct ScriptedDetector(pub VecDeque<Option<HandLandmarks>>);

    impl LandmarkDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Option<HandLandmarks>> {
            Ok(self.0.pop_front().flatten())
        }
    }

    fn frame() -> RgbImage {
        RgbImage::new(8, 8)
    }

    #[test]
    fn kalman_converges_on_a_still_point() {
        let mut filter = KalmanFilter::new(1.0 / 30.0, 0.01, 0.05);
        filter.update(Vector2::new(0.2, 0.2));
        for _ in 0..60 {
            filter.predict();
            filter.update(Vector2::new(0.6, 0.4));
        }
        let pos = filter.position();
        assert_relative_eq!(pos.x, 0.6, epsilon = 0.01);
        assert_relative_eq!(pos.y, 0.4, epsilon = 0.01);
    }

    #[test]
    fn first_measurement_seeds_filter() {
        let mut filter = KalmanFilter::new(1.0 / 30.0, 0.01, 0.05);
        filter.predict();
        filter.update(Vector2::new(0.7, 0.3));
        assert_eq!(filter.position(), Vector2::new(0.7, 0.3));
    }

    #[test]
    fn classifies_detected_hand() {
        let detector = ScriptedDetector(VecDeque::from(vec![Some(synthetic_hand(20.0, 170.0, 0.1))]));
        let mut tracker = GestureTracker::new(Box::new(detector), TrackerConfig::default());

        let result = tracker.process_frame(&frame()).unwrap();
        assert_eq!(result.gesture, Gesture::LeftClick);
        assert!(result.hand.is_some());
        assert!(result.cursor_tip.is_some());
    }

    #[test]
    fn no_hand_means_no_gesture() {
        let mut tracker = GestureTracker::new(
            Box::new(ScriptedDetector(VecDeque::new())),
            TrackerConfig::default(),
        );
        let result = tracker.process_frame(&frame()).unwrap();
        assert_eq!(result.gesture, Gesture::None);
        assert!(result.cursor_tip.is_none());
        assert_eq!(tracker.metrics().detection_rate, 0.0);
    }

    #[test]
    fn raw_tip_when_smoothing_disabled() {
        let hand = synthetic_hand(170.0, 170.0, 0.02);
        let expected = hand.index_finger_tip();
        let config = TrackerConfig {
            smooth_cursor: false,
            ..Default::default()
        };
        let mut tracker = GestureTracker::new(
            Box::new(ScriptedDetector(VecDeque::from(vec![Some(hand)]))),
            config,
        );

        let result = tracker.process_frame(&frame()).unwrap();
        assert_eq!(result.gesture, Gesture::MoveCursor);
        assert_eq!(result.cursor_tip, Some(expected));
    }

    #[test]
    fn metrics_track_detection_rate() {
        let mut metrics = PerformanceMetrics::new();
        let start = Instant::now();
        metrics.record(start, 0.02, true);
        assert_eq!(metrics.avg_fps, 0.0);
        metrics.record(start + Duration::from_millis(100), 0.04, false);
        assert_relative_eq!(metrics.detection_rate, 0.5);
        assert_relative_eq!(metrics.avg_processing_time, 0.03, epsilon = 1e-6);
        assert_relative_eq!(metrics.avg_fps, 10.0, epsilon = 1e-3);

        for i in 2..42 {
            metrics.record(start + Duration::from_millis(i * 100), 0.01, true);
        }
        assert_relative_eq!(metrics.detection_rate, 1.0);
    }

    #[test]
    fn fps_follows_frame_interval_not_detection_time() {
        // Fast detector behind a 25 fps camera.
        let mut metrics = PerformanceMetrics::new();
        let start = Instant::now();
        for i in 0..10 {
            metrics.record(start + Duration::from_millis(i * 40), 0.005, true);
        }
        assert_relative_eq!(metrics.avg_processing_time, 0.005, epsilon = 1e-6);
        assert_relative_eq!(metrics.avg_fps, 25.0, epsilon = 1e-2);
    }
}
