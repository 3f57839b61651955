// src/app.rs - Preview window around the gesture pipeline
use std::sync::Arc;

use eframe::egui;
use tracing::{info, warn};

use crate::pipeline::{FrameSnapshot, WorkerHandle, WorkerStatus};
use crate::settings::AppSettings;
use crate::ui::{self, Theme, VideoWidget};

pub struct GestureMouseApp {
    worker: WorkerHandle,
    settings: AppSettings,
    theme: Theme,
    video: VideoWidget,
    last_snapshot: Option<Arc<FrameSnapshot>>,
    last_action: Option<String>,
    failure: Option<String>,
    show_settings: bool,
    /// Applied to the worker but not yet written to disk.
    settings_dirty: bool,
}

impl GestureMouseApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: AppSettings, worker: WorkerHandle) -> Self {
        let theme = Theme::default();
        cc.egui_ctx.set_visuals(ui::create_visuals(&theme));

        Self {
            worker,
            settings,
            theme,
            video: VideoWidget::new(),
            last_snapshot: None,
            last_action: None,
            failure: None,
            show_settings: false,
            settings_dirty: false,
        }
    }

    fn poll_worker(&mut self, ctx: &egui::Context) {
        // A closed channel still holds the final Stopped/Failed status.
        if !self.worker.status.has_changed().unwrap_or(true) {
            return;
        }
        let status = self.worker.status.borrow_and_update().clone();

        match status {
            WorkerStatus::Running(snapshot) => {
                self.video.update_frame(ctx, &snapshot.frame);
                if let Some(action) = &snapshot.action {
                    self.last_action = Some(action.label());
                }
                self.last_snapshot = Some(snapshot);
            }
            WorkerStatus::Failed(msg) => self.failure = Some(msg),
            WorkerStatus::Starting | WorkerStatus::Stopped => {}
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (quit, pause) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::Space),
            )
        });

        if quit {
            info!("Quit requested");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        if pause {
            self.worker.control.toggle_pause();
        }
    }

    fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.last_snapshot {
                    Some(snapshot) => {
                        ui.label(format!("{:.0} fps", snapshot.metrics.avg_fps));
                        ui.separator();
                        let tracked = snapshot.result.hand.is_some();
                        ui.colored_label(
                            if tracked { self.theme.left_click } else { self.theme.text_secondary },
                            if tracked { "Hand tracked" } else { "No hand" },
                        );
                        ui.separator();
                        ui.label(format!(
                            "Detection rate {:.0}%",
                            snapshot.metrics.detection_rate * 100.0
                        ));
                    }
                    None => {
                        ui.label("Starting camera and hand landmarker...");
                    }
                }

                if let Some(action) = &self.last_action {
                    ui.separator();
                    ui.label(format!("Last action: {}", action));
                }
                if self.settings.actions.dry_run {
                    ui.separator();
                    ui.colored_label(self.theme.warning, "Dry run");
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    let paused = self.worker.control.is_paused();
                    if ui.button(if paused { "▶ Resume" } else { "⏸ Pause" }).clicked() {
                        self.worker.control.toggle_pause();
                    }
                });
            });
        });
    }

    fn render_preview(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(failure) = &self.failure {
                ui.centered_and_justified(|ui| {
                    ui.colored_label(self.theme.landmark, format!("Gesture pipeline stopped:\n{}", failure));
                });
                return;
            }

            ui.vertical_centered(|ui| {
                let rect = self.video.show(ui);
                let painter = ui.painter_at(rect);

                if let Some(snapshot) = &self.last_snapshot {
                    if let Some(hand) = &snapshot.result.hand {
                        ui::draw_hand_overlay(&painter, rect, hand, &self.theme);
                    }
                    ui::draw_gesture_label(&painter, rect, snapshot.result.gesture, &self.theme);
                    if snapshot.paused {
                        ui::draw_paused_banner(&painter, rect, &self.theme);
                    }
                }
            });
        });
    }

    fn render_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut changed = false;

        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(true)
            .default_size([380.0, 420.0])
            .show(ctx, |ui| {
                let thresholds = &mut self.settings.tracker.thresholds;

                ui.heading("Gesture Thresholds");
                changed |= ui
                    .add(egui::Slider::new(&mut thresholds.bent_angle, 0.0..=180.0).text("Bent below (°)"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut thresholds.straight_angle, 0.0..=180.0).text("Straight above (°)"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut thresholds.pinch_distance, 0.0..=200.0).text("Pinch distance (‰)"))
                    .changed();

                ui.separator();
                ui.heading("Cursor");
                changed |= ui
                    .checkbox(&mut self.settings.tracker.smooth_cursor, "Smooth cursor")
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut self.settings.actions.vertical_scale, 0.1..=2.0).text("Vertical scale"))
                    .changed();

                ui.separator();
                ui.heading("Clicks");
                changed |= ui
                    .add(egui::Slider::new(&mut self.settings.actions.click_cooldown_ms, 0..=2000).text("Cooldown (ms)"))
                    .changed();
                changed |= ui
                    .checkbox(&mut self.settings.actions.repeat_while_held, "Repeat while held")
                    .changed();
                changed |= ui
                    .checkbox(&mut self.settings.actions.dry_run, "Dry run (no real input)")
                    .changed();

                ui.separator();
                ui.heading("Screenshots");
                ui.label(self.settings.actions.screenshot_dir.display().to_string());
                if ui.button("Browse...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new()
                        .set_directory(&self.settings.actions.screenshot_dir)
                        .pick_folder()
                    {
                        self.settings.actions.screenshot_dir = dir;
                        changed = true;
                    }
                }
            });

        self.show_settings = open;

        if changed {
            match self.settings.validate() {
                Ok(()) => {
                    self.worker.control.update_settings(self.settings.clone());
                    self.settings_dirty = true;
                }
                Err(e) => warn!("Not applying settings: {:#}", e),
            }
        }
    }

    fn persist_settings(&mut self, ctx: &egui::Context) {
        let pointer_down = ctx.input(|i| i.pointer.any_down());
        if !should_save(self.settings_dirty, pointer_down, self.show_settings) {
            return;
        }
        self.settings_dirty = false;
        match self.settings.validate().and_then(|()| self.settings.save()) {
            Ok(()) => info!("Settings saved"),
            Err(e) => warn!("Failed to save settings: {:#}", e),
        }
    }
}

/// Slider drags apply live but only reach disk once released or when the window closes.
fn should_save(dirty: bool, pointer_down: bool, window_open: bool) -> bool {
    dirty && (!pointer_down || !window_open)
}

impl eframe::App for GestureMouseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker(ctx);
        self.handle_keys(ctx);

        self.render_status_bar(ctx);
        if self.show_settings {
            self.render_settings_window(ctx);
        }
        self.persist_settings(ctx);
        self.render_preview(ctx);

        ctx.request_repaint();
    }
}
