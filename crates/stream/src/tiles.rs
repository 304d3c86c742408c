use glam::Vec2;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use worldmap_common::{CellCoord, CellRange, CoordinateMapper, MapConfig};
use worldmap_render::{PoolStats, Stage, Visual, VisualId, VisualPool, depth};

use crate::decoration::DecorationRule;

/// Texture role of a tile. Pools are keyed by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileRole {
    Ground,
    RoadHorizontal,
    RoadVertical,
    Crossroad,
    Grass,
    Axis,
    Decoration,
}

/// How a role is drawn, in render-space pixels relative to the cell origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileStyle {
    pub texture: &'static str,
    pub size: Option<Vec2>,
    pub offset: Vec2,
    pub origin: Vec2,
    pub scale: f32,
    pub depth: i32,
}

impl TileRole {
    pub fn style(self, cell: f32) -> TileStyle {
        let base = TileStyle {
            texture: "ground3",
            size: Some(Vec2::splat(cell)),
            offset: Vec2::ZERO,
            origin: Vec2::ZERO,
            scale: 1.0,
            depth: depth::MAP_BASE,
        };
        match self {
            Self::Ground => base,
            Self::Grass => TileStyle {
                texture: "grass",
                size: Some(Vec2::splat(cell * 3.0)),
                depth: depth::GRASS,
                ..base
            },
            Self::Crossroad => TileStyle {
                texture: "road2",
                depth: depth::ROAD,
                ..base
            },
            Self::RoadHorizontal => TileStyle {
                texture: "road2",
                size: Some(Vec2::new(cell * 1.5, cell / 2.0)),
                offset: Vec2::new(-cell / 4.0, cell / 4.0),
                depth: depth::ROAD,
                ..base
            },
            Self::RoadVertical => TileStyle {
                texture: "road3",
                size: Some(Vec2::new(cell / 2.0, cell * 1.5)),
                offset: Vec2::new(cell / 4.0, -cell / 4.0),
                depth: depth::ROAD,
                ..base
            },
            Self::Axis => TileStyle {
                texture: "gray_road",
                depth: depth::AXIS,
                ..base
            },
            Self::Decoration => TileStyle {
                texture: "Coconut",
                size: None,
                origin: Vec2::new(0.5, 1.0),
                scale: 2.0,
                depth: depth::TREE,
                ..base
            },
        }
    }
}

/// What the road grid says about a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Crossroad,
    RoadHorizontal,
    RoadVertical,
    Plain,
}

/// Classify by the road modulus. Negative coordinates use the Euclidean remainder.
pub fn classify(cell: CellCoord, road_modulus: i32) -> CellKind {
    let on_x = cell.x.rem_euclid(road_modulus) == 0;
    let on_y = cell.y.rem_euclid(road_modulus) == 0;
    match (on_x, on_y) {
        (true, true) => CellKind::Crossroad,
        (false, true) => CellKind::RoadHorizontal,
        (true, false) => CellKind::RoadVertical,
        (false, false) => CellKind::Plain,
    }
}

/// Counters for one resync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResyncStats {
    pub cells_created: usize,
    pub tiles_created: usize,
    pub tiles_reused: usize,
    pub scheduled: usize,
    pub elapsed: Duration,
}

/// Counters for one retirement flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub cells_retired: usize,
    pub tiles_pooled: usize,
    /// Cells that came back into range before their retirement ran.
    pub cells_kept: usize,
}

/// Keeps exactly the tiles of the visible range materialized.
///
/// Cells leaving the range are retired in delayed batches so camera jitter
/// does not thrash the pools. Decorations are decided per cell from a seeded
/// generator, so revisiting a cell reproduces them.
pub struct TileVirtualizer {
    mapper: CoordinateMapper,
    road_modulus: i32,
    grass_modulus: i32,
    decorations: DecorationRule,
    exclusion_cells: i32,
    exclusions: Vec<CellCoord>,
    retire_delay: Duration,
    active: BTreeMap<CellCoord, Vec<(TileRole, VisualId)>>,
    pending: BTreeSet<CellCoord>,
    retire_at: Option<Duration>,
    current: Option<CellRange>,
    pool: VisualPool<TileRole>,
}

impl TileVirtualizer {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            mapper: CoordinateMapper::new(config.cell_size),
            road_modulus: config.road_modulus,
            grass_modulus: config.grass_modulus,
            decorations: DecorationRule::new(config.decoration_seed, config.decoration_chance),
            exclusion_cells: config.decoration_exclusion_cells,
            exclusions: Vec::new(),
            retire_delay: config.retire_delay(),
            active: BTreeMap::new(),
            pending: BTreeSet::new(),
            retire_at: None,
            current: None,
            pool: VisualPool::new(),
        }
    }

    /// Reconcile materialized cells with `range` at scene time `now`.
    pub fn resync<A: Clone>(&mut self, range: CellRange, now: Duration, stage: &mut Stage<A>) -> ResyncStats {
        let _span = tracing::info_span!("tile_resync", %range).entered();
        let started = Instant::now();
        let mut stats = ResyncStats::default();
        let before = self.pool.stats();

        for cell in self.active.keys() {
            if !range.contains(*cell) && self.pending.insert(*cell) {
                stats.scheduled += 1;
            }
        }
        if !self.pending.is_empty() && self.retire_at.is_none() {
            self.retire_at = Some(now + self.retire_delay);
        }

        for cell in range.cells() {
            if self.active.contains_key(&cell) {
                continue;
            }
            let tiles = self.build_cell(cell, stage);
            self.active.insert(cell, tiles);
            stats.cells_created += 1;
        }
        self.current = Some(range);

        let after = self.pool.stats();
        stats.tiles_created = (after.created - before.created) as usize;
        stats.tiles_reused = (after.reused - before.reused) as usize;
        stats.elapsed = started.elapsed();
        tracing::trace!(
            cells = stats.cells_created,
            created = stats.tiles_created,
            reused = stats.tiles_reused,
            scheduled = stats.scheduled,
            elapsed = ?stats.elapsed,
            "tile resync complete"
        );
        stats
    }

    /// Retire the pending batch once its deadline has passed. Cells that
    /// re-entered the current range are kept.
    pub fn flush_retirements<A: Clone>(&mut self, now: Duration, stage: &mut Stage<A>) -> FlushStats {
        let mut stats = FlushStats::default();
        match self.retire_at {
            Some(deadline) if now >= deadline => {}
            _ => return stats,
        }
        self.retire_at = None;

        for cell in std::mem::take(&mut self.pending) {
            if self.current.is_some_and(|r| r.contains(cell)) {
                stats.cells_kept += 1;
                continue;
            }
            if let Some(tiles) = self.active.remove(&cell) {
                stats.cells_retired += 1;
                for (role, id) in tiles {
                    if self.pool.release(role, id, stage) {
                        stats.tiles_pooled += 1;
                    }
                }
            }
        }
        tracing::debug!(
            retired = stats.cells_retired,
            kept = stats.cells_kept,
            pooled = stats.tiles_pooled,
            "tile retirements flushed"
        );
        stats
    }

    /// Building anchors decorations must keep away from. Every materialized
    /// cell is re-evaluated: decorations inside a new zone are removed and
    /// cells freed by a dropped zone get theirs back.
    pub fn set_exclusion_zones<A: Clone>(&mut self, anchors: Vec<CellCoord>, stage: &mut Stage<A>) {
        self.exclusions = anchors;
        let cells: Vec<CellCoord> = self.active.keys().copied().collect();
        let (mut added, mut removed) = (0usize, 0usize);
        for cell in cells {
            let wants = self.wants_decoration(cell);
            let has = self
                .tiles_at(cell)
                .iter()
                .position(|(r, _)| *r == TileRole::Decoration);
            match (wants, has) {
                (false, Some(index)) => {
                    if let Some(tiles) = self.active.get_mut(&cell) {
                        let (role, id) = tiles.remove(index);
                        self.pool.release(role, id, stage);
                        removed += 1;
                    }
                }
                (true, None) => {
                    let tile = self.spawn_tile(TileRole::Decoration, cell, stage);
                    if let Some(tiles) = self.active.get_mut(&cell) {
                        tiles.push(tile);
                        added += 1;
                    }
                }
                _ => {}
            }
        }
        tracing::debug!(zones = self.exclusions.len(), added, removed, "exclusion zones updated");
    }

    pub fn is_excluded(&self, cell: CellCoord) -> bool {
        let r = self.exclusion_cells as i64;
        self.exclusions.iter().any(|a| a.distance_sq(cell) < r * r)
    }

    fn wants_decoration(&self, cell: CellCoord) -> bool {
        classify(cell, self.road_modulus) == CellKind::Plain
            && !self.is_excluded(cell)
            && self.decorations.places(cell)
    }

    fn build_cell<A: Clone>(&mut self, cell: CellCoord, stage: &mut Stage<A>) -> Vec<(TileRole, VisualId)> {
        let mut roles = Vec::with_capacity(3);
        if cell.x == 0 || cell.y == 0 {
            roles.push(TileRole::Axis);
        }
        if cell.x.rem_euclid(self.grass_modulus) == 0 && cell.y.rem_euclid(self.grass_modulus) == 0 {
            roles.push(TileRole::Grass);
        }
        match classify(cell, self.road_modulus) {
            CellKind::Crossroad => roles.push(TileRole::Crossroad),
            CellKind::RoadHorizontal => roles.push(TileRole::RoadHorizontal),
            CellKind::RoadVertical => roles.push(TileRole::RoadVertical),
            CellKind::Plain => roles.push(TileRole::Ground),
        }
        if self.wants_decoration(cell) {
            roles.push(TileRole::Decoration);
        }
        roles
            .into_iter()
            .map(|role| self.spawn_tile(role, cell, stage))
            .collect()
    }

    fn spawn_tile<A: Clone>(
        &mut self,
        role: TileRole,
        cell: CellCoord,
        stage: &mut Stage<A>,
    ) -> (TileRole, VisualId) {
        let origin = self.mapper.cell_origin(cell);
        let style = role.style(self.mapper.cell_size());
        let id = self.pool.acquire(role, stage, |s| s.spawn(Visual::sprite(style.texture)));
        stage.update(id, |v| {
            v.texture = Some(style.texture.to_string());
            v.position = origin + style.offset;
            v.size = style.size;
            v.origin = style.origin;
            v.scale = style.scale;
            v.depth = style.depth;
        });
        (role, id)
    }

    pub fn active_cells(&self) -> usize {
        self.active.len()
    }

    pub fn tile_count(&self) -> usize {
        self.active.values().map(Vec::len).sum()
    }

    pub fn decoration_count(&self) -> usize {
        self.active
            .values()
            .flatten()
            .filter(|(r, _)| *r == TileRole::Decoration)
            .count()
    }

    pub fn tiles_at(&self, cell: CellCoord) -> &[(TileRole, VisualId)] {
        self.active.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_retirements(&self) -> usize {
        self.pending.len()
    }

    pub fn current_range(&self) -> Option<CellRange> {
        self.current
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pooled(&self) -> usize {
        self.pool.total_available()
    }
}
