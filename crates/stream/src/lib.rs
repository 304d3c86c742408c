//! Streaming: viewport culling, tile virtualization, deterministic decorations.
//!
//! # Invariants
//! - Culling is pure arithmetic; identical requests give identical ranges.
//! - Only cells of the current range stay materialized once retirements flush.
//! - A cell's decoration depends on the world seed and its coordinates only.

mod culling;
mod decoration;
mod schedule;
mod tiles;
mod worker;

pub use culling::{CullRequest, CullResponse, compute_visible_range};
pub use decoration::{DecorationRule, cell_seed};
pub use schedule::RegenScheduler;
pub use tiles::{CellKind, FlushStats, ResyncStats, TileRole, TileStyle, TileVirtualizer, classify};
pub use worker::{CullingBackend, CullingError, CullingWorker, InlineCuller};

pub fn crate_info() -> &'static str {
    "worldmap-stream v0.1.0"
}
