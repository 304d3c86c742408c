use glam::Vec2;
use worldmap_common::{CellRange, CoordinateMapper};

use crate::worker::CullingError;

/// Camera bounds to cull against, tagged with a sequence number so the
/// caller can tell stale responses from fresh ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullRequest {
    pub seq: u64,
    /// Top-left of the visible area, render space.
    pub origin: Vec2,
    pub size: Vec2,
    pub cell_size: f32,
    /// Extra cells on every side.
    pub buffer: i32,
}

impl CullRequest {
    pub fn new(seq: u64, origin: Vec2, size: Vec2, cell_size: f32, buffer: i32) -> Self {
        Self {
            seq,
            origin,
            size,
            cell_size,
            buffer,
        }
    }

    fn validate(&self) -> Result<(), CullingError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(CullingError::InvalidRequest(format!(
                "cell size {} is not positive",
                self.cell_size
            )));
        }
        if !self.origin.is_finite() || !self.size.is_finite() || self.size.min_element() < 0.0 {
            return Err(CullingError::InvalidRequest(format!(
                "bad bounds origin={} size={}",
                self.origin, self.size
            )));
        }
        if self.buffer < 0 {
            return Err(CullingError::InvalidRequest(format!(
                "negative buffer {}",
                self.buffer
            )));
        }
        Ok(())
    }
}

/// One culling answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CullResponse {
    pub seq: u64,
    pub range: Result<CellRange, CullingError>,
}

/// Inclusive grid range covering the request bounds plus the buffer.
///
/// The corners go through [`CoordinateMapper`], so the top of the screen maps
/// to the highest grid row.
pub fn compute_visible_range(req: &CullRequest) -> Result<CellRange, CullingError> {
    req.validate()?;
    let mapper = CoordinateMapper::new(req.cell_size);
    let span = mapper.cell_span(req.origin, req.origin + req.size);
    let b = req.buffer;
    Ok(CellRange::new(
        span.start_x.saturating_sub(b),
        span.end_x.saturating_add(b),
        span.start_y.saturating_sub(b),
        span.end_y.saturating_add(b),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use worldmap_common::CellCoord;

    fn request(x: f32, y: f32, w: f32, h: f32, buffer: i32) -> CullRequest {
        CullRequest::new(0, Vec2::new(x, y), Vec2::new(w, h), 64.0, buffer)
    }

    #[test]
    fn viewport_at_origin() {
        let range = compute_visible_range(&request(0.0, 0.0, 640.0, 320.0, 2)).unwrap();
        assert_eq!(range, CellRange::new(-2, 12, -7, 2));
    }

    #[test]
    fn screen_top_is_highest_row() {
        let range = compute_visible_range(&request(0.0, -640.0, 64.0, 64.0, 0)).unwrap();
        assert!(range.contains(CellCoord::new(0, 10)));
        assert_eq!(range.end_y, 10);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let mut bad = request(0.0, 0.0, 10.0, 10.0, 2);
        bad.cell_size = 0.0;
        assert!(matches!(
            compute_visible_range(&bad),
            Err(CullingError::InvalidRequest(_))
        ));
        assert!(compute_visible_range(&request(0.0, 0.0, -1.0, 10.0, 2)).is_err());
        assert!(compute_visible_range(&request(0.0, 0.0, 1.0, 10.0, -1)).is_err());
    }

    #[test]
    fn far_origin_does_not_overflow() {
        let range = compute_visible_range(&request(1.0e12, -1.0e12, 640.0, 320.0, 2)).unwrap();
        assert_eq!(range.end_x, i32::MAX);
        assert_eq!(range.start_x, i32::MAX - 2);
        assert_eq!(range.end_y, i32::MAX);
        assert_eq!(range.cell_count(), 9);
    }

    proptest! {
        #[test]
        fn identical_inputs_identical_ranges(
            x in -1.0e5f32..1.0e5, y in -1.0e5f32..1.0e5,
            w in 0.0f32..4000.0, h in 0.0f32..4000.0, b in 0i32..8,
        ) {
            let req = request(x, y, w, h, b);
            prop_assert_eq!(compute_visible_range(&req), compute_visible_range(&req));
        }

        #[test]
        fn extreme_origins_saturate_at_the_grid_edge(
            x in prop_oneof![Just(f32::MAX), Just(f32::MIN), -1.0e30f32..1.0e30],
            y in prop_oneof![Just(f32::MAX), Just(f32::MIN), -1.0e30f32..1.0e30],
            w in 0.0f32..4000.0, h in 0.0f32..4000.0, b in 0i32..8,
        ) {
            let range = compute_visible_range(&request(x, y, w, h, b)).unwrap();
            prop_assert!(range.start_x <= range.end_x);
            prop_assert!(range.start_y <= range.end_y);
        }

        #[test]
        fn range_covers_every_visible_pixel(
            x in -1.0e4f32..1.0e4, y in -1.0e4f32..1.0e4,
            w in 1.0f32..2000.0, h in 1.0f32..2000.0,
            fx in 0.0f32..1.0, fy in 0.0f32..1.0,
        ) {
            let req = request(x, y, w, h, 0);
            let range = compute_visible_range(&req).unwrap();
            let point = Vec2::new(x + w * fx, y + h * fy);
            let cell = CoordinateMapper::new(64.0).to_grid(point);
            prop_assert!(range.contains(cell));
        }
    }
}
