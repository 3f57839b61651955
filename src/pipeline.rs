// src/pipeline.rs - Capture -> detect -> classify -> act, on a background thread
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{Context, Result};
use image::RgbImage;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::data::SessionLog;
use crate::mediapipe_bridge::MediaPipeBridge;
use crate::mouse::{ActionDispatcher, EnigoMouse, PerformedAction, PrimaryMonitorCapturer};
use crate::settings::AppSettings;
use crate::tracking::{GestureTracker, PerformanceMetrics, TrackingResult};
use crate::video::{CameraSource, FrameSource};

#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame_index: u64,
    pub frame: Arc<RgbImage>,
    pub result: TrackingResult,
    pub action: Option<PerformedAction>,
    pub metrics: PerformanceMetrics,
    pub paused: bool,
}

#[derive(Debug, Clone)]
pub enum WorkerStatus {
    Starting,
    Running(Arc<FrameSnapshot>),
    Stopped,
    Failed(String),
}

impl WorkerStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, WorkerStatus::Stopped | WorkerStatus::Failed(_))
    }
}

pub struct GesturePipeline {
    source: Box<dyn FrameSource>,
    tracker: GestureTracker,
    dispatcher: ActionDispatcher,
    session: Option<SessionLog>,
    frame_index: u64,
    paused: bool,
}

impl GesturePipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        tracker: GestureTracker,
        dispatcher: ActionDispatcher,
        session: Option<SessionLog>,
    ) -> Self {
        Self {
            source,
            tracker,
            dispatcher,
            session,
            frame_index: 0,
            paused: false,
        }
    }

    /// Wires up the real camera, sidecar detector and OS mouse.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        let source = CameraSource::open(&settings.camera).context("Camera unavailable")?;
        let detector =
            MediaPipeBridge::spawn(settings.detector.clone()).context("Hand landmarker unavailable")?;
        let dispatcher = ActionDispatcher::new(
            Box::new(EnigoMouse::new()?),
            Box::new(PrimaryMonitorCapturer),
            settings.actions.clone(),
        )?;
        let session = settings
            .record_session
            .then(|| SessionLog::new(&settings.session_dir, None));

        Ok(Self::new(
            Box::new(source),
            GestureTracker::new(Box::new(detector), settings.tracker.clone()),
            dispatcher,
            session,
        ))
    }

    pub fn set_paused(&mut self, paused: bool) {
        if paused != self.paused {
            info!("Gesture control {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    pub fn apply_settings(&mut self, settings: &AppSettings) {
        self.tracker.set_config(settings.tracker.clone());
        self.dispatcher.set_config(settings.actions.clone());
        info!("Applied updated settings");
    }

    /// Processes one frame. Frame or detector failures are returned; action failures are logged.
    pub fn step(&mut self) -> Result<FrameSnapshot> {
        let frame = self.source.read_frame()?;
        let result = self.tracker.process_frame(&frame)?;

        let action = if self.paused {
            self.dispatcher.observe(result.gesture);
            None
        } else {
            match self
                .dispatcher
                .dispatch(result.gesture, result.cursor_tip, Instant::now())
            {
                Ok(action) => action,
                Err(e) => {
                    warn!("Failed to perform {:?}: {:#}", result.gesture, e);
                    None
                }
            }
        };

        if let Some(session) = self.session.as_mut() {
            session.add_frame(self.frame_index, &result, action.as_ref());
        }

        let snapshot = FrameSnapshot {
            frame_index: self.frame_index,
            frame: Arc::new(frame),
            result,
            action,
            metrics: self.tracker.metrics().clone(),
            paused: self.paused,
        };
        self.frame_index += 1;

        Ok(snapshot)
    }

    /// Flushes the session log, if one is being kept.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            if session.is_empty() {
                return Ok(());
            }
            let path = session.export_csv()?;
            let summary = session.summary();
            info!(
                "Session saved to {} ({} frames, {} with hand, {} actions)",
                path.display(),
                summary.frames,
                summary.frames_with_hand,
                summary.actions
            );
        }
        Ok(())
    }
}

/// Shared between the UI and the worker thread.
#[derive(Default)]
pub struct WorkerControl {
    stop: AtomicBool,
    paused: AtomicBool,
    pending_settings: Mutex<Option<AppSettings>>,
}

impl WorkerControl {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn update_settings(&self, settings: AppSettings) {
        if let Ok(mut pending) = self.pending_settings.lock() {
            *pending = Some(settings);
        }
    }

    fn take_settings(&self) -> Option<AppSettings> {
        self.pending_settings.lock().ok().and_then(|mut p| p.take())
    }
}

pub struct WorkerHandle {
    pub status: watch::Receiver<WorkerStatus>,
    pub control: Arc<WorkerControl>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Resolves once the worker reports it has stopped or failed.
    pub async fn finished(&mut self) {
        loop {
            if self.status.borrow().is_finished() {
                return;
            }
            if self.status.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn stop(&mut self) {
        self.control.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Gesture pipeline thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds the pipeline with `build` on a new thread and runs it until stopped.
pub fn spawn_worker<F>(settings: AppSettings, build: F) -> Result<WorkerHandle>
where
    F: FnOnce(&AppSettings) -> Result<GesturePipeline> + Send + 'static,
{
    let (tx, rx) = watch::channel(WorkerStatus::Starting);
    let control = Arc::new(WorkerControl::default());
    let worker_control = control.clone();

    let thread = std::thread::Builder::new()
        .name("gesture-pipeline".into())
        .spawn(move || {
            let status = match run_worker(&settings, build, &worker_control, &tx) {
                Ok(()) => WorkerStatus::Stopped,
                Err(e) => {
                    error!("Gesture pipeline stopped: {:#}", e);
                    WorkerStatus::Failed(format!("{:#}", e))
                }
            };
            tx.send_replace(status);
        })
        .context("Failed to spawn pipeline thread")?;

    Ok(WorkerHandle {
        status: rx,
        control,
        thread: Some(thread),
    })
}

fn run_worker<F>(
    settings: &AppSettings,
    build: F,
    control: &WorkerControl,
    tx: &watch::Sender<WorkerStatus>,
) -> Result<()>
where
    F: FnOnce(&AppSettings) -> Result<GesturePipeline>,
{
    let mut pipeline = build(settings)?;
    info!("Gesture pipeline running");

    let outcome = loop {
        if control.stop.load(Ordering::SeqCst) {
            break Ok(());
        }
        if let Some(updated) = control.take_settings() {
            pipeline.apply_settings(&updated);
        }
        pipeline.set_paused(control.is_paused());

        match pipeline.step() {
            Ok(snapshot) => {
                tx.send_replace(WorkerStatus::Running(Arc::new(snapshot)));
            }
            Err(e) => break Err(e),
        }
    };

    pipeline.finish()?;
    outcome
}
