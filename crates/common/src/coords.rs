use glam::Vec2;

use crate::types::{CellCoord, CellRange};

/// Default edge length of one grid cell in render-space pixels.
pub const DEFAULT_CELL_SIZE: f32 = 64.0;

/// Maps world grid coordinates to render-space pixels and back.
///
/// The vertical axis is inverted: grid `y` grows upwards, render `y` grows
/// downwards. Every component that places or culls things goes through this
/// type so the sign convention lives in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    cell_size: f32,
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl CoordinateMapper {
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self { cell_size }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Top-left pixel of a (possibly fractional) grid position.
    pub fn to_render_space(&self, grid_x: f32, grid_y: f32) -> Vec2 {
        Vec2::new(grid_x * self.cell_size, -grid_y * self.cell_size)
    }

    /// Top-left pixel of an integer cell.
    pub fn cell_origin(&self, cell: CellCoord) -> Vec2 {
        self.to_render_space(cell.x as f32, cell.y as f32)
    }

    /// Centre pixel of a grid position; players stand here.
    pub fn cell_center(&self, grid_x: f32, grid_y: f32) -> Vec2 {
        self.to_render_space(grid_x, grid_y) + Vec2::splat(self.cell_size / 2.0)
    }

    /// The cell whose tile covers the given render-space pixel.
    pub fn to_grid(&self, point: Vec2) -> CellCoord {
        CellCoord::new(
            (point.x / self.cell_size).floor() as i32,
            ((point.y / self.cell_size).floor() as i32).saturating_neg(),
        )
    }

    /// Cells covered by the render-space rectangle spanned by `a` and `b`.
    pub fn cell_span(&self, a: Vec2, b: Vec2) -> CellRange {
        let (p, q) = (self.to_grid(a), self.to_grid(b));
        CellRange::new(p.x.min(q.x), p.x.max(q.x), p.y.min(q.y), p.y.max(q.y))
    }
}
