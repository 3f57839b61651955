// src/main.rs
mod app;
mod data;
mod error;
mod gesture;
mod landmarks;
mod mediapipe_bridge;
mod mouse;
mod pipeline;
mod settings;
mod tracking;
mod ui;
mod video;

use anyhow::{Context, Result};
use eframe::egui;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::pipeline::{GesturePipeline, WorkerStatus};
use crate::settings::AppSettings;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gesture_mouse=info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut settings = AppSettings::load();
    if std::env::args().any(|a| a == "--headless") {
        settings.headless = true;
    }
    if std::env::args().any(|a| a == "--dry-run") {
        settings.actions.dry_run = true;
    }

    if let Err(e) = video::list_cameras() {
        warn!("{:#}", e);
    }

    let worker = pipeline::spawn_worker(settings.clone(), GesturePipeline::from_settings)?;

    if settings.headless {
        return run_headless(worker);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 760.0])
            .with_min_inner_size([480.0, 400.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Gesture Mouse",
        options,
        Box::new(move |cc| Box::new(app::GestureMouseApp::new(cc, settings, worker))),
    )
    .map_err(|e| anyhow::anyhow!("Preview window failed: {}", e))
}

fn run_headless(mut worker: pipeline::WorkerHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    info!("Running headless, press Ctrl-C to stop");

    runtime.block_on(async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            _ = worker.finished() => {}
        }
    });

    worker.stop();

    let status = worker.status.borrow().clone();
    match status {
        WorkerStatus::Failed(msg) => Err(anyhow::anyhow!("Gesture pipeline failed: {}", msg)),
        _ => Ok(()),
    }
}
