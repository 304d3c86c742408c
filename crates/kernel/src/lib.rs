//! World Kernel: wire protocol records and the authoritative client-side roster.
//!
//! # Invariants
//! - A malformed record never aborts decoding of its siblings.
//! - Occupancy is derived from player records only; buildings never store it.
//! - Iteration order is deterministic (BTreeMap).

pub mod protocol;
pub mod roster;

pub use protocol::{BuildingState, EquipSlot, InboundEvent, Item, PlayerState, ProtocolError};
pub use roster::{OccupancyChange, Roster};

pub fn crate_info() -> &'static str {
    "worldmap-kernel v0.1.0"
}
