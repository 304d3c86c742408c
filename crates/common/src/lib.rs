//! Shared vocabulary for the world map engine: identifiers, grid cells,
//! coordinate mapping, easing curves and configuration.
//!
//! # Invariants
//! - Grid `y` grows upwards, render `y` grows downwards; only
//!   [`CoordinateMapper`] converts between the two.
//! - Wire identifiers are normalized to strings so numeric and string ids
//!   of the same entity compare equal.

pub mod config;
pub mod coords;
pub mod ease;
pub mod types;

pub use config::{ConfigError, MapConfig};
pub use coords::{CoordinateMapper, DEFAULT_CELL_SIZE};
pub use ease::Ease;
pub use types::{
    BuildingId, CellCoord, CellRange, ItemId, PlayerId, deserialize_optional_building,
};

pub fn crate_info() -> &'static str {
    "worldmap-common v0.1.0"
}
