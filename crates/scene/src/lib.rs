//! Scene: building and player subsystems, the inbound pipeline, the event bus
//! and the [`WorldScene`] that ties them to the stage.
//!
//! # Invariants
//! - A player body is visible iff its record has no building id.
//! - At most one materialized object per entity id; only the diff engines create or recycle them.
//! - Occupant lists are derived from the roster, never stored on building records.
//! - At most one player is highlighted.
//! - Of a burst of queued frames only the newest is applied.

pub mod buildings;
pub mod bus;
pub mod inspect;
pub mod pipeline;
pub mod players;
pub mod scene;

use worldmap_input::UiAction;
use worldmap_render::Stage;

/// The stage every scene visual lives on; listeners carry [`UiAction`]s.
pub type SceneStage = Stage<UiAction>;

pub use buildings::{BuildingObject, BuildingSubsystem, OccupantOverlay, house_texture, occupant_text};
pub use bus::{BusEvent, EventBus, Panel, Subscription, SubscriptionId, Topic};
pub use inspect::{PlayerInfo, SceneInspector, SceneSummary};
pub use pipeline::{InboundPipeline, InboundSink, MessageQueue, PipelineError, PipelineStats};
pub use players::{AnimationSet, Direction, MotionState, PlayerObject, PlayerSubsystem};
pub use scene::{InteriorRequest, WorldScene};

pub fn crate_info() -> &'static str {
    "worldmap-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}
