//! Rendering Adapter: headless scene graph and renderer-agnostic interface.
//!
//! The [`Stage`] holds every render object the scene has built. Backends read
//! it through the [`Renderer`] trait; a debug text renderer stands in for a
//! GPU backend in the CLI and tests.
//!
//! # Invariants
//! - Renderers cannot mutate the stage.
//! - A pooled visual is hidden, inactive and has no listeners.
//! - Destroying a visual destroys its subtree.

pub mod atlas;
pub mod pool;
mod renderer;
pub mod stage;
pub mod tween;

pub use atlas::{FALLBACK_BUILDING, TextureAtlas, TextureKind, depth};
pub use pool::{PoolStats, VisualPool};
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use stage::{Listener, PointerEvent, Stage, Visual, VisualId, VisualKind};
pub use tween::{PropKind, Repeat, TweenId, TweenProp, TweenSpec, Tweens};

pub fn crate_info() -> &'static str {
    "worldmap-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
