// src/ui.rs - Preview widgets: camera frame, landmark overlay, gesture badge
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use image::RgbImage;

use crate::gesture::Gesture;
use crate::landmarks::{HandLandmarks, HAND_CONNECTIONS};

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub surface: Color32,
    pub landmark: Color32,
    pub connection: Color32,
    pub left_click: Color32,
    pub right_click: Color32,
    pub other_action: Color32,
    pub warning: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            surface: Color32::from_rgb(30, 30, 35),
            landmark: Color32::from_rgb(244, 67, 54),
            connection: Color32::WHITE,
            left_click: Color32::from_rgb(0, 255, 0),
            right_click: Color32::from_rgb(255, 0, 0),
            other_action: Color32::from_rgb(0, 255, 255),
            warning: Color32::from_rgb(255, 152, 0),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

impl Theme {
    pub fn gesture_color(&self, gesture: Gesture) -> Color32 {
        match gesture {
            Gesture::LeftClick => self.left_click,
            Gesture::RightClick => self.right_click,
            Gesture::DoubleClick | Gesture::Screenshot => self.other_action,
            Gesture::MoveCursor => self.primary,
            Gesture::None => self.text_secondary,
        }
    }
}

pub fn create_visuals(theme: &Theme) -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.override_text_color = Some(theme.text_primary);
    visuals.panel_fill = theme.surface;
    visuals.window_fill = theme.surface;
    visuals.widgets.noninteractive.bg_fill = theme.surface;
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = theme.primary;

    visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);
    visuals.widgets.active.rounding = egui::Rounding::same(6.0);
    visuals.window_rounding = egui::Rounding::same(10.0);

    visuals
}

/// Camera frame shown as a texture, keeping the frame's aspect ratio.
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    frame_size: [usize; 2],
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            texture: None,
            frame_size: [640, 480],
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &RgbImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.as_raw());
        self.frame_size = size;

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("camera_frame", image, egui::TextureOptions::LINEAR))
            }
        }
    }

    /// Draws the frame and returns the screen rect it occupies.
    pub fn show(&self, ui: &mut egui::Ui) -> Rect {
        let available = ui.available_size();
        let aspect = self.frame_size[0] as f32 / self.frame_size[1].max(1) as f32;
        let width = available.x.min(available.y * aspect);
        let size = Vec2::new(width, width / aspect);

        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

        if let Some(texture) = &self.texture {
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        } else {
            ui.painter().rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Waiting for camera...",
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
        }

        rect
    }
}

fn to_screen(rect: Rect, x: f64, y: f64) -> Pos2 {
    Pos2::new(
        rect.left() + x as f32 * rect.width(),
        rect.top() + y as f32 * rect.height(),
    )
}

pub fn draw_hand_overlay(painter: &egui::Painter, rect: Rect, hand: &HandLandmarks, theme: &Theme) {
    let points = hand.points();

    for (from, to) in HAND_CONNECTIONS {
        painter.line_segment(
            [
                to_screen(rect, points[from].x, points[from].y),
                to_screen(rect, points[to].x, points[to].y),
            ],
            Stroke::new(2.0, theme.connection),
        );
    }

    for p in points.iter() {
        let pos = to_screen(rect, p.x, p.y);
        painter.circle_filled(pos, 4.0, theme.landmark);
        painter.circle_stroke(pos, 5.0, Stroke::new(1.0, theme.connection));
    }
}

/// Gesture name in the top-left corner of the frame.
pub fn draw_gesture_label(painter: &egui::Painter, rect: Rect, gesture: Gesture, theme: &Theme) {
    if gesture == Gesture::None {
        return;
    }
    painter.text(
        rect.left_top() + Vec2::new(20.0, 20.0),
        egui::Align2::LEFT_TOP,
        gesture.label(),
        egui::FontId::proportional(26.0),
        theme.gesture_color(gesture),
    );
}

pub fn draw_paused_banner(painter: &egui::Painter, rect: Rect, theme: &Theme) {
    painter.text(
        rect.center_bottom() - Vec2::new(0.0, 20.0),
        egui::Align2::CENTER_BOTTOM,
        "PAUSED (space to resume)",
        egui::FontId::proportional(20.0),
        theme.warning,
    );
}
