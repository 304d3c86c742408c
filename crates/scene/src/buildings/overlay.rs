use glam::Vec2;
use worldmap_common::BuildingId;
use worldmap_input::UiAction;
use worldmap_render::{PointerEvent, Visual, VisualId, depth};

use crate::SceneStage;

pub const MIN_WIDTH: f32 = 200.0;
pub const MAX_WIDTH: f32 = 400.0;
pub const PADDING: f32 = 10.0;
pub const BACKGROUND_ALPHA: f32 = 0.5;
pub const HOVER_ALPHA: f32 = 0.6;
const FONT_PX: f32 = 14.0;

/// Overlay text: building name, occupant count, names.
pub fn occupant_text(building_name: &str, names: &[String]) -> String {
    let n = names.len();
    let plural = if n > 1 { "s" } else { "" };
    format!("{building_name}\n{n} player{plural} inside\n{}", names.join(", "))
}

/// Approximate extent of `text` at `font_px`, used for hit areas.
pub(crate) fn text_extent(text: &str, font_px: f32) -> Vec2 {
    let lines = text.lines().count().max(1);
    let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    Vec2::new(widest as f32 * font_px * 0.6, lines as f32 * font_px * 1.25)
}

/// Interactive label above an occupied building.
///
/// Owns a container with a background panel and a text child; destroying the
/// container takes both children and their listeners with it.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupantOverlay {
    pub root: VisualId,
    pub background: VisualId,
    pub text: VisualId,
    width: f32,
}

impl OccupantOverlay {
    pub fn spawn(stage: &mut SceneStage, building: &BuildingId, anchor: Vec2, content: &str) -> Self {
        let root = stage.spawn(Visual::container().at(anchor).with_depth(depth::BUILDING_INFO));
        let background = stage.spawn_child(
            root,
            Visual::panel(Vec2::splat(MIN_WIDTH), 0x000000)
                .with_alpha(BACKGROUND_ALPHA)
                .with_depth(depth::BUILDING_INFO - 1),
        );
        let text = stage.spawn_child(root, Visual::text(content).with_depth(depth::BUILDING_INFO));

        let hover = |hovered| UiAction::HoverOverlay {
            building: building.clone(),
            hovered,
        };
        stage.on(background, PointerEvent::Over, hover(true));
        stage.on(background, PointerEvent::Out, hover(false));
        stage.on(background, PointerEvent::Down, UiAction::FocusBuilding(building.clone()));

        let mut overlay = Self {
            root,
            background,
            text,
            width: MIN_WIDTH,
        };
        overlay.set_text(stage, content);
        overlay
    }

    /// Replace the text and refit the background.
    pub fn set_text(&mut self, stage: &mut SceneStage, content: &str) {
        let extent = text_extent(content, FONT_PX);
        self.width = (extent.x + PADDING * 2.0).clamp(MIN_WIDTH, MAX_WIDTH);
        let height = extent.y + PADDING * 2.0;
        stage.update(self.text, |v| {
            v.text = content.to_string();
            v.size = Some(extent);
        });
        let width = self.width;
        stage.update(self.background, |v| v.size = Some(Vec2::new(width, height)));
    }

    pub fn move_to(&self, stage: &mut SceneStage, anchor: Vec2) {
        stage.update(self.root, |v| v.position = anchor);
    }

    pub fn set_hover(&self, stage: &mut SceneStage, hovered: bool) {
        let alpha = if hovered { HOVER_ALPHA } else { BACKGROUND_ALPHA };
        stage.update(self.background, |v| v.alpha = alpha);
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn text<'s>(&self, stage: &'s SceneStage) -> Option<&'s str> {
        stage.get(self.text).map(|v| v.text.as_str())
    }

    pub fn destroy(self, stage: &mut SceneStage) {
        stage.destroy(self.root);
    }
}
