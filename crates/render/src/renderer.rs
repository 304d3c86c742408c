use glam::Vec2;
use std::fmt::Write;

use crate::stage::{Stage, VisualId, VisualKind};

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Render-space point at the top-left of the viewport.
    pub scroll: Vec2,
    pub zoom: f32,
    /// Viewport size in screen pixels.
    pub viewport: Vec2,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            scroll: Vec2::ZERO,
            zoom: 1.0,
            viewport: Vec2::new(800.0, 600.0),
        }
    }
}

impl RenderView {
    /// Visible render-space rectangle as `(min, max)`.
    pub fn world_bounds(&self) -> (Vec2, Vec2) {
        let size = self.viewport / self.zoom;
        (self.scroll, self.scroll + size)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = self.world_bounds();
        point.cmpge(min).all() && point.cmple(max).all()
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads the stage and a view configuration, then produces
/// output. It never mutates the stage; the scene owns it.
pub trait Renderer<A> {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given stage and view.
    fn render(&self, stage: &Stage<A>, view: &RenderView) -> Self::Output;
}

/// Debug text renderer.
///
/// Produces a human-readable listing of what would be drawn, in draw order.
/// Useful for CLI output, logging, and testing the render interface.
#[derive(Debug)]
pub struct DebugTextRenderer {
    /// Maximum number of visuals listed; the rest are summarized.
    pub limit: usize,
}

impl Default for DebugTextRenderer {
    fn default() -> Self {
        Self { limit: 64 }
    }
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }
}

impl<A: Clone> Renderer<A> for DebugTextRenderer {
    type Output = String;

    fn render(&self, stage: &Stage<A>, view: &RenderView) -> String {
        let mut drawn: Vec<(VisualId, Vec2)> = stage
            .ids()
            .filter(|id| stage.is_shown(*id))
            .filter(|id| stage.get(*id).is_some_and(|v| v.kind != VisualKind::Container))
            .filter_map(|id| stage.world_position(id).map(|p| (id, p)))
            .filter(|(_, p)| view.contains(*p))
            .collect();
        drawn.sort_by_key(|(id, _)| (stage.render_order(*id), *id));

        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Stage (visuals={}, shown={}, drawn={}) ===",
            stage.len(),
            stage.shown_count(),
            drawn.len()
        );
        let _ = writeln!(
            out,
            "Camera: scroll=({:.1}, {:.1}) zoom={:.2} viewport={}x{}",
            view.scroll.x, view.scroll.y, view.zoom, view.viewport.x, view.viewport.y
        );

        for (id, p) in drawn.iter().take(self.limit) {
            let Some(v) = stage.get(*id) else { continue };
            let what = match v.kind {
                VisualKind::Text => format!("text {:?}", v.text),
                VisualKind::Panel => "panel".to_string(),
                _ => format!(
                    "{}[{}]",
                    v.texture.as_deref().unwrap_or("?"),
                    v.frame
                ),
            };
            let _ = writeln!(
                out,
                "  {:>8} d={:<6} pos=({:.1}, {:.1}) a={:.2}{} {}",
                id.to_string(),
                v.depth,
                p.x,
                p.y,
                v.alpha,
                if v.tint.is_some() { " tinted" } else { "" },
                what
            );
        }
        if drawn.len() > self.limit {
            let _ = writeln!(out, "  ... {} more", drawn.len() - self.limit);
        }
        out
    }
}
