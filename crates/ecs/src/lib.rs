//! Entity diff engine: reconciles server snapshots with materialized render objects.
//!
//! Records are keyed by id in a BTreeMap for deterministic iteration order.
//! Entity-specific behavior (creation, change detection, recycling) lives
//! behind the [`Materializer`] trait so buildings and players share one engine.
//!
//! # Invariants
//! - At most one materialized object per id.
//! - Objects are only created, updated or recycled through the engine.
//! - An invalid record never destroys the object previously built for its id.

pub mod diff;

pub use diff::{DiffEngine, DiffReport, EntityRecord, Materializer, SnapshotMode};

pub fn crate_info() -> &'static str {
    "worldmap-ecs v0.1.0"
}
