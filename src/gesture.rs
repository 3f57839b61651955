// src/gesture.rs - Rule-based gesture classification over hand landmarks
use serde::{Deserialize, Serialize};

use crate::landmarks::HandLandmarks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    MoveCursor,
    LeftClick,
    RightClick,
    DoubleClick,
    Screenshot,
    None,
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::MoveCursor => "Move",
            Gesture::LeftClick => "Left Click",
            Gesture::RightClick => "Right Click",
            Gesture::DoubleClick => "Double Click",
            Gesture::Screenshot => "Screenshot Taken",
            Gesture::None => "No Gesture",
        }
    }

    /// Gestures that fire a one-shot action rather than a continuous one.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            Gesture::LeftClick | Gesture::RightClick | Gesture::DoubleClick | Gesture::Screenshot
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureThresholds {
    /// A finger whose PIP angle is below this is bent (degrees).
    pub bent_angle: f64,
    /// A finger whose PIP angle is above this is straight (degrees).
    pub straight_angle: f64,
    /// Thumb tip to index MCP gap separating a pinch from an open thumb (per-mille).
    pub pinch_distance: f64,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            bent_angle: 50.0,
            straight_angle: 90.0,
            pinch_distance: 50.0,
        }
    }
}

/// Measurements the rules are evaluated on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandMeasurements {
    pub index_angle: f64,
    pub middle_angle: f64,
    pub thumb_index_distance: f64,
}

impl HandMeasurements {
    pub fn of(hand: &HandLandmarks) -> Self {
        Self {
            index_angle: hand.index_finger_angle(),
            middle_angle: hand.middle_finger_angle(),
            thumb_index_distance: hand.thumb_index_distance(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    thresholds: GestureThresholds,
}

impl GestureClassifier {
    pub fn new(thresholds: GestureThresholds) -> Self {
        Self { thresholds }
    }

    pub fn set_thresholds(&mut self, thresholds: GestureThresholds) {
        self.thresholds = thresholds;
    }

    pub fn classify(&self, hand: &HandLandmarks) -> Gesture {
        self.classify_measurements(&HandMeasurements::of(hand))
    }

    pub fn classify_optional(&self, hand: Option<&HandLandmarks>) -> Gesture {
        hand.map(|h| self.classify(h)).unwrap_or(Gesture::None)
    }

    /// First matching rule wins; the order matters where rules overlap.
    pub fn classify_measurements(&self, m: &HandMeasurements) -> Gesture {
        let t = &self.thresholds;

        let index_bent = m.index_angle < t.bent_angle;
        let index_straight = m.index_angle > t.straight_angle;
        let middle_bent = m.middle_angle < t.bent_angle;
        let middle_straight = m.middle_angle > t.straight_angle;
        let pinched = m.thumb_index_distance < t.pinch_distance;
        let thumb_open = m.thumb_index_distance > t.pinch_distance;

        if pinched && index_straight {
            Gesture::MoveCursor
        } else if index_bent && middle_straight && thumb_open {
            Gesture::LeftClick
        } else if middle_bent && index_straight && thumb_open {
            Gesture::RightClick
        } else if index_bent && middle_bent && thumb_open {
            Gesture::DoubleClick
        } else if index_bent && middle_bent && pinched {
            Gesture::Screenshot
        } else {
            Gesture::None
        }
    }
}
