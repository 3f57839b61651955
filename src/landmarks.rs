// src/landmarks.rs - Hand landmark layout and the geometry gestures are built on
use nalgebra::Vector2;

use crate::error::{GestureMouseError, Result};

/// Number of keypoints the hand landmarker reports per hand.
pub const LANDMARK_COUNT: usize = 21;

/// MediaPipe hand landmark indices.
#[allow(dead_code)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Skeleton edges drawn over the preview.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (5, 9), (9, 10), (10, 11), (11, 12),
    (9, 13), (13, 14), (14, 15), (15, 16),
    (13, 17), (17, 18), (18, 19), (19, 20),
    (0, 17),
];

/// One tracked hand. Coordinates are normalized to the frame, (0, 0) top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: [Vector2<f64>; LANDMARK_COUNT],
    pub score: f64,
    pub handedness: String,
}

impl HandLandmarks {
    pub fn from_points(points: &[Vector2<f64>], score: f64, handedness: impl Into<String>) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(GestureMouseError::LandmarkCount(points.len()));
        }

        let mut fixed = [Vector2::zeros(); LANDMARK_COUNT];
        fixed.copy_from_slice(points);

        Ok(Self {
            points: fixed,
            score,
            handedness: handedness.into(),
        })
    }

    pub fn points(&self) -> &[Vector2<f64>; LANDMARK_COUNT] {
        &self.points
    }

    pub fn point(&self, idx: usize) -> Vector2<f64> {
        self.points[idx]
    }

    /// Bend at the index PIP joint (MCP, PIP, TIP).
    pub fn index_finger_angle(&self) -> f64 {
        joint_angle(
            self.points[index::INDEX_FINGER_MCP],
            self.points[index::INDEX_FINGER_PIP],
            self.points[index::INDEX_FINGER_TIP],
        )
    }

    /// Bend at the middle PIP joint (MCP, PIP, TIP).
    pub fn middle_finger_angle(&self) -> f64 {
        joint_angle(
            self.points[index::MIDDLE_FINGER_MCP],
            self.points[index::MIDDLE_FINGER_PIP],
            self.points[index::MIDDLE_FINGER_TIP],
        )
    }

    /// Gap between the thumb tip and the base of the index finger, per-mille of the frame.
    pub fn thumb_index_distance(&self) -> f64 {
        landmark_distance(
            self.points[index::THUMB_TIP],
            self.points[index::INDEX_FINGER_MCP],
        )
    }

    pub fn index_finger_tip(&self) -> Vector2<f64> {
        self.points[index::INDEX_FINGER_TIP]
    }
}

/// Angle at `b` between the rays towards `a` and `c`, in degrees within [0, 180].
pub fn joint_angle(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;

    if ba.norm() == 0.0 || bc.norm() == 0.0 {
        return 0.0;
    }

    let radians = bc.y.atan2(bc.x) - ba.y.atan2(ba.x);
    let degrees = radians.to_degrees().abs();

    if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    }
}

/// Distance between two normalized points rescaled to [0, 1000].
pub fn landmark_distance(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    ((b - a).norm() * 1000.0).clamp(0.0, 1000.0)
}
