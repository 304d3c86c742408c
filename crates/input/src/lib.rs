//! Input: camera control and the actions pointer listeners carry.
//!
//! # Invariants
//! - Listeners hold [`UiAction`] values, never closures.
//! - Camera scroll is the render-space top-left of the view; zoom keeps the centre.
//! - Wheel zoom stays within `[zoom_min, zoom_max]`, buttons within `[zoom_button_min, zoom_max]`.

pub mod action;
pub mod camera;

pub use action::UiAction;
pub use camera::{CameraController, CameraSettings, CameraSignal};

pub fn crate_info() -> &'static str {
    "worldmap-input v0.1.0"
}
