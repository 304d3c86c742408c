use glam::Vec2;
use worldmap_common::PlayerId;
use worldmap_stream::CullingBackend;

use crate::players::MotionState;
use crate::scene::WorldScene;

/// Read-only diagnostics over a [`WorldScene`].
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary<C: CullingBackend>(scene: &WorldScene<C>) -> SceneSummary {
        let stage = scene.stage();
        let players = scene.players();
        let visible_players = players.ids().filter(|id| players.is_visible(id, stage)).count();
        SceneSummary {
            now_ms: scene.now().as_millis() as u64,
            players: players.len(),
            visible_players,
            buildings: scene.buildings().len(),
            overlays: scene.buildings().overlay_count(),
            active_cells: scene.tiles().active_cells(),
            tiles: scene.tiles().tile_count(),
            decorations: scene.tiles().decoration_count(),
            pending_retirements: scene.tiles().pending_retirements(),
            visuals: stage.len(),
            shown: stage.shown_count(),
            tweens: scene.tweens().len(),
            selected: players.selected().cloned(),
            zoom: scene.camera().zoom(),
            scroll: scene.camera().scroll(),
            asleep: scene.is_asleep(),
        }
    }

    pub fn inspect_player<C: CullingBackend>(scene: &WorldScene<C>, id: &PlayerId) -> Option<PlayerInfo> {
        let players = scene.players();
        let record = players.record(id)?;
        let object = players.get(id)?;
        Some(PlayerInfo {
            id: id.clone(),
            name: record.display_name().to_string(),
            position: players.position(id, scene.stage())?,
            target: object.target,
            motion: object.animator.state(),
            visible: players.is_visible(id, scene.stage()),
            building: record.building_id.as_ref().map(ToString::to_string),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SceneSummary {
    pub now_ms: u64,
    pub players: usize,
    pub visible_players: usize,
    pub buildings: usize,
    pub overlays: usize,
    pub active_cells: usize,
    pub tiles: usize,
    pub decorations: usize,
    pub pending_retirements: usize,
    pub visuals: usize,
    pub shown: usize,
    pub tweens: usize,
    pub selected: Option<PlayerId>,
    pub zoom: f32,
    pub scroll: Vec2,
    pub asleep: bool,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Scene: t={}ms players={} (visible {}) buildings={} overlays={}{}",
            self.now_ms,
            self.players,
            self.visible_players,
            self.buildings,
            self.overlays,
            if self.asleep { " [asleep]" } else { "" }
        )?;
        writeln!(
            f,
            "Tiles: cells={} tiles={} decorations={} retiring={}",
            self.active_cells, self.tiles, self.decorations, self.pending_retirements
        )?;
        write!(
            f,
            "Stage: visuals={} shown={} tweens={} camera=({:.1}, {:.1}) zoom={:.2}",
            self.visuals, self.shown, self.tweens, self.scroll.x, self.scroll.y, self.zoom
        )?;
        if let Some(id) = &self.selected {
            write!(f, " selected={id}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub target: Vec2,
    pub motion: MotionState,
    pub visible: bool,
    pub building: Option<String>,
}

impl std::fmt::Display for PlayerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Player {} {:?} pos=({:.1}, {:.1}) target=({:.1}, {:.1}) {}",
            self.id, self.name, self.position.x, self.position.y, self.target.x, self.target.y, self.motion
        )?;
        match &self.building {
            Some(b) => write!(f, " inside={b}"),
            None if self.visible => Ok(()),
            None => write!(f, " hidden"),
        }
    }
}
