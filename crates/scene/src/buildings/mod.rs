//! Building containers, name labels and occupant overlays.

mod overlay;
mod texture;

pub use overlay::{OccupantOverlay, occupant_text};
pub use texture::house_texture;

use glam::Vec2;
use std::collections::BTreeMap;
use worldmap_common::{BuildingId, CellCoord, CoordinateMapper, MapConfig};
use worldmap_ecs::{DiffEngine, DiffReport, Materializer, SnapshotMode};
use worldmap_input::UiAction;
use worldmap_kernel::BuildingState;
use worldmap_render::{
    FALLBACK_BUILDING, PointerEvent, PoolStats, TextureAtlas, Visual, VisualId, VisualPool, depth,
};

use crate::SceneStage;
use overlay::text_extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildingPart {
    /// Container with ground, pad and house children.
    Body,
    Label,
}

/// Placement rules shared by every building.
#[derive(Debug, Clone, Copy)]
pub struct BuildingLayout {
    mapper: CoordinateMapper,
    road_modulus: i32,
}

impl BuildingLayout {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            mapper: CoordinateMapper::new(config.cell_size),
            road_modulus: config.road_modulus,
        }
    }

    /// Edge length of the house sprite: one road block minus the road.
    pub fn footprint(&self) -> f32 {
        self.mapper.cell_size() * (self.road_modulus - 1) as f32
    }

    /// Top-left of the building container for an entrance cell.
    pub fn anchor(&self, entrance: CellCoord) -> Vec2 {
        let row = entrance.y as f32 + (self.road_modulus - 2) as f32;
        self.mapper.to_render_space(entrance.x as f32, row)
    }

    pub fn label_position(&self, anchor: Vec2) -> Vec2 {
        let half = self.footprint() / 2.0;
        anchor + Vec2::new(half, half - self.road_modulus as f32 * 30.0)
    }

    pub fn overlay_position(&self, anchor: Vec2) -> Vec2 {
        anchor + Vec2::new(self.footprint() / 2.0, self.mapper.cell_size())
    }

    /// Centre of the house sprite; camera pans aim here.
    pub fn focus_point(&self, anchor: Vec2) -> Vec2 {
        anchor + Vec2::splat(self.footprint() / 2.0)
    }
}

/// Render objects owned by one materialized building.
#[derive(Debug)]
pub struct BuildingObject {
    pub body: VisualId,
    pub ground: VisualId,
    pub pad: VisualId,
    pub house: VisualId,
    pub label: VisualId,
    pub overlay: Option<OccupantOverlay>,
    anchor: Vec2,
}

impl BuildingObject {
    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }
}

fn label_text(record: &BuildingState) -> String {
    format!("{} <{}>", record.name, record.id)
}

struct BuildingMaterializer<'a> {
    stage: &'a mut SceneStage,
    pool: &'a mut VisualPool<BuildingPart>,
    atlas: &'a TextureAtlas,
    layout: BuildingLayout,
    occupants: &'a BTreeMap<BuildingId, Vec<String>>,
}

impl BuildingMaterializer<'_> {
    fn style_body(&mut self, object: &BuildingObject, record: &BuildingState) {
        let size = self.layout.footprint();
        let texture = house_texture(record, self.atlas);
        let anchor = object.anchor;
        self.stage.update(object.body, |v| {
            v.position = anchor;
            v.depth = depth::BUILDING_MAIN;
        });
        self.stage.update(object.ground, |v| {
            v.texture = Some("ground3".to_string());
            v.position = Vec2::splat(-size / 2.0);
            v.size = Some(Vec2::splat(size * 2.0));
            v.origin = Vec2::ZERO;
            v.depth = depth::BUILDING_GROUND;
        });
        self.stage.update(object.pad, |v| {
            v.texture = Some("ground2".to_string());
            v.position = Vec2::ZERO;
            v.size = Some(Vec2::splat(size));
            v.origin = Vec2::ZERO;
            v.depth = depth::BUILDING_DECORATION;
        });
        self.stage.update(object.house, |v| {
            v.texture = Some(texture);
            v.position = Vec2::new(0.0, -10.0);
            v.size = Some(Vec2::splat(size));
            v.origin = Vec2::ZERO;
            v.depth = depth::BUILDING_MAIN;
        });

        let text = label_text(record);
        let extent = text_extent(&text, 14.0);
        let position = self.layout.label_position(anchor);
        self.stage.update(object.label, |v| {
            v.text = text;
            v.size = Some(extent);
            v.position = position;
            v.depth = depth::BUILDING_NAME;
        });
    }

    fn sync_overlay(&mut self, object: &mut BuildingObject, record: &BuildingState) {
        let names = self.occupants.get(&record.id).map(Vec::as_slice).unwrap_or(&[]);
        sync_overlay(self.stage, &self.layout, object, record, names);
    }
}

/// Create, refresh or destroy the occupant overlay to match `names`.
fn sync_overlay(
    stage: &mut SceneStage,
    layout: &BuildingLayout,
    object: &mut BuildingObject,
    record: &BuildingState,
    names: &[String],
) {
    if names.is_empty() {
        if let Some(overlay) = object.overlay.take() {
            tracing::debug!(building = %record.id, "removing occupant overlay");
            overlay.destroy(stage);
        }
        return;
    }
    let content = occupant_text(&record.name, names);
    let position = layout.overlay_position(object.anchor);
    match &mut object.overlay {
        Some(overlay) => {
            overlay.set_text(stage, &content);
            overlay.move_to(stage, position);
        }
        None => {
            tracing::debug!(building = %record.id, occupants = names.len(), "creating occupant overlay");
            object.overlay = Some(OccupantOverlay::spawn(stage, &record.id, position, &content));
        }
    }
}

impl Materializer<BuildingState> for BuildingMaterializer<'_> {
    type Object = BuildingObject;

    fn create(&mut self, record: &BuildingState) -> Option<BuildingObject> {
        let entrance = record.entrance?;
        let body = self.pool.acquire(BuildingPart::Body, self.stage, |s| {
            let body = s.spawn(Visual::container());
            for texture in ["ground3", "ground2", FALLBACK_BUILDING] {
                s.spawn_child(body, Visual::sprite(texture));
            }
            body
        });
        let &[ground, pad, house] = self.stage.children(body) else {
            tracing::warn!(building = %record.id, "pooled building body lost its children");
            self.stage.destroy(body);
            return None;
        };
        let label = self
            .pool
            .acquire(BuildingPart::Label, self.stage, |s| s.spawn(Visual::text("")));

        let mut object = BuildingObject {
            body,
            ground,
            pad,
            house,
            label,
            overlay: None,
            anchor: self.layout.anchor(entrance),
        };
        self.style_body(&object, record);
        self.stage
            .on(house, PointerEvent::Down, UiAction::EnterBuilding(record.id.clone()));
        self.stage
            .on(label, PointerEvent::Down, UiAction::OpenBuildingInfo(record.id.clone()));
        self.sync_overlay(&mut object, record);
        Some(object)
    }

    fn changed(&self, old: &BuildingState, new: &BuildingState) -> bool {
        old.name != new.name
            || old.kind != new.kind
            || old.entrance != new.entrance
            || old.capabilities != new.capabilities
    }

    fn update(&mut self, object: &mut BuildingObject, _old: &BuildingState, new: &BuildingState) {
        if let Some(entrance) = new.entrance {
            object.anchor = self.layout.anchor(entrance);
        }
        self.style_body(object, new);
        self.sync_overlay(object, new);
    }

    fn recycle(&mut self, mut object: BuildingObject, record: &BuildingState) {
        if let Some(overlay) = object.overlay.take() {
            overlay.destroy(self.stage);
        }
        self.pool.release(BuildingPart::Label, object.label, self.stage);
        self.pool.release(BuildingPart::Body, object.body, self.stage);
        tracing::debug!(building = %record.id, "building recycled");
    }
}

/// Materialized buildings and their occupant overlays.
pub struct BuildingSubsystem {
    engine: DiffEngine<BuildingState, BuildingObject>,
    pool: VisualPool<BuildingPart>,
    layout: BuildingLayout,
    /// Latest occupant names per building, including buildings not (yet) materialized.
    occupants: BTreeMap<BuildingId, Vec<String>>,
}

impl BuildingSubsystem {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            engine: DiffEngine::new("buildings"),
            pool: VisualPool::new(),
            layout: BuildingLayout::new(config),
            occupants: BTreeMap::new(),
        }
    }

    /// Reconcile with a building roster. Buildings are always sent whole.
    pub fn apply(
        &mut self,
        records: Vec<BuildingState>,
        stage: &mut SceneStage,
        atlas: &TextureAtlas,
    ) -> DiffReport<BuildingId> {
        let mut materializer = BuildingMaterializer {
            stage,
            pool: &mut self.pool,
            atlas,
            layout: self.layout,
            occupants: &self.occupants,
        };
        self.engine
            .apply_snapshot(records, SnapshotMode::Full, &mut materializer)
    }

    /// Replace the occupant list of `building` and refresh its overlay.
    pub fn set_occupants(&mut self, building: &BuildingId, names: Vec<String>, stage: &mut SceneStage) {
        if names.is_empty() {
            self.occupants.remove(building);
        } else {
            self.occupants.insert(building.clone(), names);
        }
        let names = self.occupants.get(building).map(Vec::as_slice).unwrap_or(&[]);
        let Some(record) = self.engine.record(building).cloned() else {
            return;
        };
        if let Some(object) = self.engine.get_mut(building) {
            sync_overlay(stage, &self.layout, object, &record, names);
        }
    }

    pub fn set_hover(&self, building: &BuildingId, hovered: bool, stage: &mut SceneStage) {
        if let Some(overlay) = self.overlay(building) {
            overlay.set_hover(stage, hovered);
        }
    }

    pub fn get(&self, building: &BuildingId) -> Option<&BuildingObject> {
        self.engine.get(building)
    }

    pub fn record(&self, building: &BuildingId) -> Option<&BuildingState> {
        self.engine.record(building)
    }

    pub fn overlay(&self, building: &BuildingId) -> Option<&OccupantOverlay> {
        self.get(building).and_then(|b| b.overlay.as_ref())
    }

    pub fn overlay_text<'s>(&self, building: &BuildingId, stage: &'s SceneStage) -> Option<&'s str> {
        self.overlay(building).and_then(|o| o.text(stage))
    }

    pub fn occupant_names(&self, building: &BuildingId) -> &[String] {
        self.occupants.get(building).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Where a camera pan to `building` should aim.
    pub fn focus_point(&self, building: &BuildingId) -> Option<Vec2> {
        self.get(building).map(|b| self.layout.focus_point(b.anchor))
    }

    /// Entrance cells of every materialized building.
    pub fn entrances(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.engine.iter().filter_map(|(_, record, _)| record.entrance)
    }

    pub fn ids(&self) -> impl Iterator<Item = &BuildingId> {
        self.engine.iter().map(|(id, _, _)| id)
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    pub fn overlay_count(&self) -> usize {
        self.engine.iter().filter(|(_, _, b)| b.overlay.is_some()).count()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
