// src/data.rs
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;

use crate::gesture::Gesture;
use crate::mouse::PerformedAction;
use crate::tracking::TrackingResult;

#[derive(Debug, Clone, Serialize)]
struct GestureRecord {
    timestamp: f64,
    frame: u64,
    hand_detected: bool,
    gesture: String,
    action: Option<String>,
    cursor_x: Option<f64>,
    cursor_y: Option<f64>,
    index_angle: Option<f64>,
    middle_angle: Option<f64>,
    thumb_index_distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: usize,
    pub frames_with_hand: usize,
    pub gestures: BTreeMap<String, usize>,
    pub actions: usize,
}

pub struct SessionLog {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<GestureRecord>,
    summary: SessionSummary,
}

impl SessionLog {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
            summary: SessionSummary::default(),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn add_frame(&mut self, frame: u64, result: &TrackingResult, action: Option<&PerformedAction>) {
        let record = GestureRecord {
            timestamp: result.timestamp,
            frame,
            hand_detected: result.hand.is_some(),
            gesture: format!("{:?}", result.gesture),
            action: action.map(|a| a.label()),
            cursor_x: result.cursor_tip.map(|t| t.x),
            cursor_y: result.cursor_tip.map(|t| t.y),
            index_angle: result.measurements.map(|m| m.index_angle),
            middle_angle: result.measurements.map(|m| m.middle_angle),
            thumb_index_distance: result.measurements.map(|m| m.thumb_index_distance),
        };

        self.summary.frames += 1;
        if record.hand_detected {
            self.summary.frames_with_hand += 1;
        }
        if result.gesture != Gesture::None {
            *self.summary.gestures.entry(record.gesture.clone()).or_insert(0) += 1;
        }
        if action.is_some() {
            self.summary.actions += 1;
        }

        self.records.push(record);
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("gestures.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create session directory {}", parent.display()))?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        Ok(csv_path)
    }
}
