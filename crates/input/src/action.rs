use worldmap_common::{BuildingId, PlayerId};

/// What a pointer listener on a scene visual asks for.
///
/// Visuals store these as plain data; the scene interprets them after hit
/// testing, so recycling a visual can never leave a live callback behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    /// Highlight a player and announce the selection.
    SelectPlayer(PlayerId),
    /// Building name label: select it and switch the side panel to its info.
    OpenBuildingInfo(BuildingId),
    /// Occupant overlay: select the building and pan the camera to it.
    FocusBuilding(BuildingId),
    /// Pointer entered or left an occupant overlay.
    HoverOverlay { building: BuildingId, hovered: bool },
    /// House sprite: enter the interior scene if someone is inside.
    EnterBuilding(BuildingId),
    ZoomIn,
    ZoomOut,
}

impl UiAction {
    /// The building this action concerns, if any.
    pub fn building(&self) -> Option<&BuildingId> {
        match self {
            Self::OpenBuildingInfo(id)
            | Self::FocusBuilding(id)
            | Self::EnterBuilding(id)
            | Self::HoverOverlay { building: id, .. } => Some(id),
            Self::SelectPlayer(_) | Self::ZoomIn | Self::ZoomOut => None,
        }
    }
}
