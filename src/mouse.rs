// src/mouse.rs - Turning gestures into pointer movement, clicks and screenshots
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use image::RgbaImage;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GestureMouseError;
use crate::gesture::Gesture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

pub trait MouseBackend {
    fn screen_size(&mut self) -> Result<(u32, u32)>;
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn click(&mut self, button: MouseButton) -> Result<()>;
    fn double_click(&mut self) -> Result<()>;
}

pub trait ScreenCapturer {
    fn capture(&mut self) -> Result<RgbaImage>;
}

pub struct EnigoMouse {
    enigo: Enigo,
}

impl EnigoMouse {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| GestureMouseError::Mouse(format!("failed to connect to input system: {:?}", e)))?;
        Ok(Self { enigo })
    }
}

fn enigo_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
    }
}

impl MouseBackend for EnigoMouse {
    fn screen_size(&mut self) -> Result<(u32, u32)> {
        let (w, h) = self
            .enigo
            .main_display()
            .map_err(|e| GestureMouseError::Mouse(format!("failed to query display size: {:?}", e)))?;
        Ok((w.max(1) as u32, h.max(1) as u32))
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| GestureMouseError::Mouse(format!("{:?}", e)).into())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        let button = enigo_button(button);
        self.enigo
            .button(button, Direction::Press)
            .and_then(|_| self.enigo.button(button, Direction::Release))
            .map_err(|e| GestureMouseError::Mouse(format!("{:?}", e)).into())
    }

    fn double_click(&mut self) -> Result<()> {
        for _ in 0..2 {
            self.enigo
                .button(Button::Left, Direction::Click)
                .map_err(|e| GestureMouseError::Mouse(format!("{:?}", e)))?;
        }
        Ok(())
    }
}

/// Captures the primary monitor.
pub struct PrimaryMonitorCapturer;

impl ScreenCapturer for PrimaryMonitorCapturer {
    fn capture(&mut self) -> Result<RgbaImage> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| GestureMouseError::ScreenCapture(e.to_string()))?;

        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| GestureMouseError::ScreenCapture("no monitor found".into()))?;

        let shot = monitor
            .capture_image()
            .map_err(|e| GestureMouseError::ScreenCapture(e.to_string()))?;

        let (width, height) = (shot.width(), shot.height());
        RgbaImage::from_raw(width, height, shot.into_raw())
            .ok_or_else(|| GestureMouseError::ScreenCapture("capture buffer has the wrong size".into()).into())
    }
}

/// Maps a normalized fingertip position onto screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorMapper {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Vertical gain; 0.5 maps the upper half of the frame onto the full screen height.
    pub vertical_scale: f64,
}

impl CursorMapper {
    pub fn map(&self, tip: Vector2<f64>) -> (i32, i32) {
        let max_x = self.screen_width.saturating_sub(1) as f64;
        let max_y = self.screen_height.saturating_sub(1) as f64;

        let x = (tip.x * self.screen_width as f64).clamp(0.0, max_x);
        let y = (tip.y * self.vertical_scale * self.screen_height as f64).clamp(0.0, max_y);

        (x as i32, y as i32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Minimum gap between two discrete actions.
    pub click_cooldown_ms: u64,
    /// Keep firing a held click gesture once the cooldown has passed.
    pub repeat_while_held: bool,
    /// Report actions without touching the real pointer.
    pub dry_run: bool,
    pub vertical_scale: f64,
    pub screenshot_dir: PathBuf,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            click_cooldown_ms: 400,
            repeat_while_held: false,
            dry_run: false,
            vertical_scale: 0.5,
            screenshot_dir: directories::UserDirs::new()
                .and_then(|dirs| dirs.picture_dir().map(|p| p.join("GestureMouse")))
                .unwrap_or_else(|| PathBuf::from("./screenshots")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PerformedAction {
    Moved { x: i32, y: i32 },
    Clicked(MouseButton),
    DoubleClicked,
    Screenshot(PathBuf),
}

impl PerformedAction {
    pub fn label(&self) -> String {
        match self {
            PerformedAction::Moved { x, y } => format!("move {},{}", x, y),
            PerformedAction::Clicked(MouseButton::Left) => "left_click".to_string(),
            PerformedAction::Clicked(MouseButton::Right) => "right_click".to_string(),
            PerformedAction::DoubleClicked => "double_click".to_string(),
            PerformedAction::Screenshot(path) => format!("screenshot {}", path.display()),
        }
    }
}

pub struct ActionDispatcher {
    mouse: Box<dyn MouseBackend>,
    capturer: Box<dyn ScreenCapturer>,
    mapper: CursorMapper,
    config: ActionConfig,
    last_gesture: Gesture,
    last_discrete: Option<Instant>,
    /// Set when a discrete gesture was entered inside the cooldown and is still held.
    pending_entry: bool,
}

impl ActionDispatcher {
    pub fn new(
        mut mouse: Box<dyn MouseBackend>,
        capturer: Box<dyn ScreenCapturer>,
        config: ActionConfig,
    ) -> Result<Self> {
        let (screen_width, screen_height) = mouse.screen_size()?;
        info!("Screen size {}x{}", screen_width, screen_height);

        Ok(Self {
            mouse,
            capturer,
            mapper: CursorMapper {
                screen_width,
                screen_height,
                vertical_scale: config.vertical_scale,
            },
            config,
            last_gesture: Gesture::None,
            last_discrete: None,
            pending_entry: false,
        })
    }

    pub fn set_config(&mut self, config: ActionConfig) {
        self.mapper.vertical_scale = config.vertical_scale;
        self.config = config;
    }

    /// Tracks `gesture` as the current hand state without acting on it.
    pub fn observe(&mut self, gesture: Gesture) {
        if gesture != self.last_gesture {
            self.pending_entry = false;
        }
        self.last_gesture = gesture;
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        let cooldown = Duration::from_millis(self.config.click_cooldown_ms);
        self.last_discrete
            .map(|t| now.saturating_duration_since(t) >= cooldown)
            .unwrap_or(true)
    }

    /// Performs whatever `gesture` asks for. `tip` is the normalized index fingertip.
    pub fn dispatch(
        &mut self,
        gesture: Gesture,
        tip: Option<Vector2<f64>>,
        now: Instant,
    ) -> Result<Option<PerformedAction>> {
        let entered = gesture != self.last_gesture;
        self.observe(gesture);

        if gesture == Gesture::MoveCursor {
            let Some(tip) = tip else {
                return Ok(None);
            };
            let (x, y) = self.mapper.map(tip);
            if !self.config.dry_run {
                self.mouse.move_to(x, y)?;
            }
            return Ok(Some(PerformedAction::Moved { x, y }));
        }

        if !gesture.is_discrete() {
            return Ok(None);
        }
        if !(entered || self.pending_entry || self.config.repeat_while_held) {
            return Ok(None);
        }
        if !self.cooldown_elapsed(now) {
            // Fire once the cooldown runs out if the hand keeps the gesture.
            self.pending_entry |= entered;
            return Ok(None);
        }
        self.pending_entry = false;
        self.last_discrete = Some(now);

        let action = match gesture {
            Gesture::LeftClick => {
                if !self.config.dry_run {
                    self.mouse.click(MouseButton::Left)?;
                }
                PerformedAction::Clicked(MouseButton::Left)
            }
            Gesture::RightClick => {
                if !self.config.dry_run {
                    self.mouse.click(MouseButton::Right)?;
                }
                PerformedAction::Clicked(MouseButton::Right)
            }
            Gesture::DoubleClick => {
                if !self.config.dry_run {
                    self.mouse.double_click()?;
                }
                PerformedAction::DoubleClicked
            }
            Gesture::Screenshot => {
                let path = screenshot_path(&self.config.screenshot_dir);
                if !self.config.dry_run {
                    let shot = self.capturer.capture()?;
                    save_screenshot(&shot, &path)?;
                }
                PerformedAction::Screenshot(path)
            }
            Gesture::MoveCursor | Gesture::None => return Ok(None),
        };

        info!("{}", action.label());
        Ok(Some(action))
    }
}

pub fn screenshot_path(dir: &Path) -> PathBuf {
    let id = uuid::Uuid::new_v4().simple().to_string();
    dir.join(format!(
        "screenshot_{}_{}.png",
        Local::now().format("%Y%m%d_%H%M%S"),
        &id[..8]
    ))
}

fn save_screenshot(shot: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create screenshot directory {}", parent.display()))?;
    }
    shot.save(path)
        .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
    debug!("Saved screenshot {}", path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum MouseEvent {
        Move(i32, i32),
        Click(MouseButton),
        DoubleClick,
        Capture,
    }

    pub(crate) type EventLog = Arc<Mutex<Vec<MouseEvent>>>;

    pub(crate) struct RecordingMouse(pub EventLog);

    impl MouseBackend for RecordingMouse {
        fn screen_size(&mut self) -> Result<(u32, u32)> {
            Ok((1920, 1080))
        }
        fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
            self.0.lock().unwrap().push(MouseEvent::Move(x, y));
            Ok(())
        }
        fn click(&mut self, button: MouseButton) -> Result<()> {
            self.0.lock().unwrap().push(MouseEvent::Click(button));
            Ok(())
        }
        fn double_click(&mut self) -> Result<()> {
            self.0.lock().unwrap().push(MouseEvent::DoubleClick);
            Ok(())
        }
    }

    pub(crate) struct SolidCapturer(pub EventLog);

    impl ScreenCapturer for SolidCapturer {
        fn capture(&mut self) -> Result<RgbaImage> {
            self.0.lock().unwrap().push(MouseEvent::Capture);
            Ok(RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255])))
        }
    }

    pub(crate) fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gesture_mouse_{}_{}", tag, uuid::Uuid::new_v4()))
    }

    pub(crate) fn recording_dispatcher(config: ActionConfig) -> (ActionDispatcher, EventLog) {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ActionDispatcher::new(
            Box::new(RecordingMouse(log.clone())),
            Box::new(SolidCapturer(log.clone())),
            config,
        )
        .unwrap();
        (dispatcher, log)
    }

    #[test]
    fn maps_fingertip_to_screen() {
        let mapper = CursorMapper {
            screen_width: 1920,
            screen_height: 1080,
            vertical_scale: 0.5,
        };
        assert_eq!(mapper.map(Vector2::new(0.5, 0.5)), (960, 270));
        assert_eq!(mapper.map(Vector2::new(0.25, 1.0)), (480, 540));
    }

    #[test]
    fn mapping_is_clamped_to_screen() {
        let mapper = CursorMapper {
            screen_width: 1920,
            screen_height: 1080,
            vertical_scale: 1.0,
        };
        assert_eq!(mapper.map(Vector2::new(1.4, -0.2)), (1919, 0));
        assert_eq!(mapper.map(Vector2::new(-0.1, 1.5)), (0, 1079));
    }

    #[test]
    fn move_gesture_moves_every_frame() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        let now = Instant::now();
        let tip = Some(Vector2::new(0.5, 0.5));

        d.dispatch(Gesture::MoveCursor, tip, now).unwrap();
        d.dispatch(Gesture::MoveCursor, tip, now).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![MouseEvent::Move(960, 270), MouseEvent::Move(960, 270)]
        );
    }

    #[test]
    fn held_click_fires_once() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        let start = Instant::now();

        for i in 0..10 {
            d.dispatch(Gesture::LeftClick, None, start + Duration::from_millis(i * 100))
                .unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![MouseEvent::Click(MouseButton::Left)]);
    }

    #[test]
    fn cooldown_suppresses_flicker() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        let start = Instant::now();

        d.dispatch(Gesture::RightClick, None, start).unwrap();
        d.dispatch(Gesture::None, None, start + Duration::from_millis(50)).unwrap();
        let again = d
            .dispatch(Gesture::RightClick, None, start + Duration::from_millis(100))
            .unwrap();
        assert!(again.is_none());

        d.dispatch(Gesture::None, None, start + Duration::from_millis(450)).unwrap();
        let later = d
            .dispatch(Gesture::RightClick, None, start + Duration::from_millis(500))
            .unwrap();
        assert_eq!(later, Some(PerformedAction::Clicked(MouseButton::Right)));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn click_entered_during_cooldown_fires_when_held() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        let start = Instant::now();

        d.dispatch(Gesture::LeftClick, None, start).unwrap();
        d.dispatch(Gesture::None, None, start + Duration::from_millis(50)).unwrap();

        let mut fired_at = Vec::new();
        for ms in (100..=1000).step_by(33) {
            let action = d
                .dispatch(Gesture::LeftClick, None, start + Duration::from_millis(ms))
                .unwrap();
            if action.is_some() {
                fired_at.push(ms);
            }
        }

        assert_eq!(
            *log.lock().unwrap(),
            vec![MouseEvent::Click(MouseButton::Left), MouseEvent::Click(MouseButton::Left)]
        );
        // First frame at or after the 400 ms cooldown.
        assert_eq!(fired_at, vec![430]);
    }

    #[test]
    fn pending_click_is_dropped_when_gesture_changes() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        let start = Instant::now();

        d.dispatch(Gesture::LeftClick, None, start).unwrap();
        d.dispatch(Gesture::None, None, start + Duration::from_millis(50)).unwrap();
        d.dispatch(Gesture::LeftClick, None, start + Duration::from_millis(100)).unwrap();
        d.dispatch(Gesture::None, None, start + Duration::from_millis(150)).unwrap();
        d.dispatch(Gesture::None, None, start + Duration::from_millis(600)).unwrap();

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn observed_gesture_is_not_entered_again() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        let start = Instant::now();

        d.observe(Gesture::RightClick);
        let held = d.dispatch(Gesture::RightClick, None, start).unwrap();
        assert!(held.is_none());

        d.observe(Gesture::None);
        let entered = d
            .dispatch(Gesture::RightClick, None, start + Duration::from_millis(100))
            .unwrap();
        assert_eq!(entered, Some(PerformedAction::Clicked(MouseButton::Right)));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn repeat_without_cooldown_fires_each_frame() {
        let config = ActionConfig {
            click_cooldown_ms: 0,
            repeat_while_held: true,
            ..Default::default()
        };
        let (mut d, log) = recording_dispatcher(config);
        let now = Instant::now();

        for _ in 0..3 {
            d.dispatch(Gesture::DoubleClick, None, now).unwrap();
        }
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn dry_run_reports_without_output() {
        let config = ActionConfig {
            dry_run: true,
            ..Default::default()
        };
        let (mut d, log) = recording_dispatcher(config);
        let now = Instant::now();

        let action = d.dispatch(Gesture::LeftClick, None, now).unwrap();
        assert_eq!(action, Some(PerformedAction::Clicked(MouseButton::Left)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn screenshot_is_written_to_disk() {
        let dir = temp_dir("shots");
        let config = ActionConfig {
            screenshot_dir: dir.clone(),
            ..Default::default()
        };
        let (mut d, log) = recording_dispatcher(config);

        let action = d.dispatch(Gesture::Screenshot, None, Instant::now()).unwrap();
        let Some(PerformedAction::Screenshot(path)) = action else {
            panic!("expected a screenshot, got {:?}", action);
        };

        assert!(path.starts_with(&dir));
        assert!(path.exists());
        assert_eq!(*log.lock().unwrap(), vec![MouseEvent::Capture]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn move_without_tip_does_nothing() {
        let (mut d, log) = recording_dispatcher(ActionConfig::default());
        assert!(d.dispatch(Gesture::MoveCursor, None, Instant::now()).unwrap().is_none());
        assert!(log.lock().unwrap().is_empty());
    }
}
