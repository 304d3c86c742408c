use glam::Vec2;
use std::time::Duration;
use worldmap_common::{Ease, MapConfig};

/// Something the scene should react to after camera input or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSignal {
    /// Visible area changed enough that tiles should be regenerated.
    Regenerate,
    /// A pan started with [`CameraController::pan_to`] reached its target.
    PanCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub wheel_factor: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub button_step: f32,
    pub button_min: f32,
    pub zoom_tween: Duration,
    /// Quiet time after a wheel zoom before tiles are regenerated.
    pub wheel_settle: Duration,
    /// Scroll distance per axis that triggers regeneration on its own.
    pub scroll_threshold: f32,
}

impl CameraSettings {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            wheel_factor: 0.001,
            zoom_min: config.zoom_min,
            zoom_max: config.zoom_max,
            button_step: 0.2,
            button_min: config.zoom_button_min,
            zoom_tween: Duration::from_millis(100),
            wheel_settle: Duration::from_millis(150),
            scroll_threshold: config.cell_size / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    pointer: Vec2,
    scroll: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct ZoomTween {
    from: f32,
    to: f32,
    elapsed: Duration,
    /// Wheel zooms wait for `wheel_settle` before regenerating, buttons do not.
    settle: bool,
}

#[derive(Debug, Clone, Copy)]
struct Pan {
    from_center: Vec2,
    to_center: Vec2,
    from_zoom: f32,
    to_zoom: f32,
    elapsed: Duration,
    duration: Duration,
    ease: Ease,
}

/// Scroll, zoom and viewport of the map camera.
///
/// `scroll` is the render-space point at the top-left of the screen; the
/// visible area is `viewport / zoom` wide. Zoom changes keep the view centre fixed.
#[derive(Debug, Clone)]
pub struct CameraController {
    settings: CameraSettings,
    scroll: Vec2,
    zoom: f32,
    viewport: Vec2,
    drag: Option<Drag>,
    zoom_tween: Option<ZoomTween>,
    pan: Option<Pan>,
    settle_left: Option<Duration>,
    last_regen_scroll: Vec2,
}

impl CameraController {
    pub fn new(settings: CameraSettings, viewport: Vec2) -> Self {
        Self {
            settings,
            scroll: Vec2::ZERO,
            zoom: 1.0,
            viewport,
            drag: None,
            zoom_tween: None,
            pan: None,
            settle_left: None,
            last_regen_scroll: Vec2::ZERO,
        }
    }

    /// Camera at the configured start position.
    pub fn from_config(config: &MapConfig) -> Self {
        let mut camera = Self::new(
            CameraSettings::from_config(config),
            Vec2::from(config.viewport),
        );
        camera.zoom = config.initial_zoom;
        camera.scroll = Vec2::from(config.initial_scroll);
        camera.last_regen_scroll = camera.scroll;
        camera
    }

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Visible render-space rectangle as `(top_left, size)`.
    pub fn world_view(&self) -> (Vec2, Vec2) {
        (self.scroll, self.viewport / self.zoom)
    }

    pub fn center(&self) -> Vec2 {
        self.scroll + self.viewport / (2.0 * self.zoom)
    }

    /// Screen pixel to render-space point.
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        self.scroll + screen / self.zoom
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn resize(&mut self, viewport: Vec2) -> CameraSignal {
        let center = self.center();
        self.viewport = viewport;
        self.center_on(center);
        CameraSignal::Regenerate
    }

    pub fn center_on(&mut self, point: Vec2) {
        self.scroll = point - self.viewport / (2.0 * self.zoom);
    }

    fn set_zoom_keep_center(&mut self, zoom: f32) {
        let center = self.center();
        self.zoom = zoom;
        self.center_on(center);
    }

    pub fn pointer_down(&mut self, screen: Vec2) {
        self.drag = Some(Drag {
            pointer: screen,
            scroll: self.scroll,
        });
    }

    /// Drag the camera; returns a regeneration signal while dragging.
    pub fn pointer_move(&mut self, screen: Vec2) -> Option<CameraSignal> {
        let drag = self.drag?;
        self.scroll = drag.scroll - (screen - drag.pointer) / self.zoom;
        Some(CameraSignal::Regenerate)
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Wheel zoom: `zoom + delta_y * factor`, clamped, eased over a short tween.
    pub fn wheel(&mut self, delta_y: f32) {
        let target = (self.zoom + delta_y * self.settings.wheel_factor)
            .clamp(self.settings.zoom_min, self.settings.zoom_max);
        self.start_zoom(target, true);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_button(self.settings.button_step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_button(-self.settings.button_step);
    }

    fn zoom_button(&mut self, delta: f32) {
        let target = (self.zoom + delta).clamp(self.settings.button_min, self.settings.zoom_max);
        self.start_zoom(target, false);
    }

    fn start_zoom(&mut self, to: f32, settle: bool) {
        self.zoom_tween = Some(ZoomTween {
            from: self.zoom,
            to,
            elapsed: Duration::ZERO,
            settle,
        });
    }

    /// Ease the view centre to `target` (render space), optionally zooming.
    pub fn pan_to(&mut self, target: Vec2, zoom: Option<f32>, duration: Duration, ease: Ease) {
        self.drag = None;
        self.pan = Some(Pan {
            from_center: self.center(),
            to_center: target,
            from_zoom: self.zoom,
            to_zoom: zoom.unwrap_or(self.zoom),
            elapsed: Duration::ZERO,
            duration,
            ease,
        });
    }

    /// Advance tweens and timers by `dt`.
    pub fn advance(&mut self, dt: Duration) -> Vec<CameraSignal> {
        let mut signals = Vec::new();

        if let Some(left) = self.settle_left {
            match left.checked_sub(dt) {
                Some(rest) if !rest.is_zero() => self.settle_left = Some(rest),
                _ => {
                    self.settle_left = None;
                    signals.push(CameraSignal::Regenerate);
                }
            }
        }

        if let Some(mut tween) = self.zoom_tween.take() {
            tween.elapsed += dt;
            let t = progress(tween.elapsed, self.settings.zoom_tween);
            self.set_zoom_keep_center(tween.from + (tween.to - tween.from) * t);
            if t >= 1.0 {
                tracing::trace!(zoom = self.zoom, "zoom tween finished");
                if tween.settle {
                    self.settle_left = Some(self.settings.wheel_settle);
                } else {
                    signals.push(CameraSignal::Regenerate);
                }
            } else {
                self.zoom_tween = Some(tween);
            }
        }

        if let Some(mut pan) = self.pan.take() {
            pan.elapsed += dt;
            let t = progress(pan.elapsed, pan.duration);
            let e = pan.ease.apply(t);
            self.zoom = pan.from_zoom + (pan.to_zoom - pan.from_zoom) * e;
            self.center_on(pan.from_center.lerp(pan.to_center, e));
            if t >= 1.0 {
                tracing::debug!(center = ?pan.to_center, zoom = self.zoom, "camera pan completed");
                signals.push(CameraSignal::PanCompleted);
                signals.push(CameraSignal::Regenerate);
            } else {
                self.pan = Some(pan);
            }
        }

        let moved = (self.scroll - self.last_regen_scroll).abs();
        if moved.max_element() > self.settings.scroll_threshold {
            self.last_regen_scroll = self.scroll;
            if !signals.contains(&CameraSignal::Regenerate) {
                signals.push(CameraSignal::Regenerate);
            }
        }
        signals
    }
}

fn progress(elapsed: Duration, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
}
