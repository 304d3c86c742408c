use glam::Vec2;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use worldmap_common::{BuildingId, CellCoord, ConfigError, Ease, MapConfig, PlayerId};
use worldmap_ecs::SnapshotMode;
use worldmap_input::{CameraController, CameraSignal, UiAction};
use worldmap_kernel::{BuildingState, InboundEvent, PlayerState, Roster};
use worldmap_render::{PointerEvent, RenderView, Renderer, TextureAtlas, Tweens, VisualId};
use worldmap_stream::{CullRequest, CullingBackend, InlineCuller, RegenScheduler, TileVirtualizer};

use crate::SceneStage;
use crate::buildings::BuildingSubsystem;
use crate::bus::{BusEvent, EventBus, Panel, Subscription, Topic};
use crate::pipeline::InboundSink;
use crate::players::PlayerSubsystem;

/// Ask the host to show the interior of `building` for `player`.
#[derive(Debug, Clone, PartialEq)]
pub struct InteriorRequest {
    pub building: BuildingId,
    pub player: PlayerState,
}

/// The world map: owns the stage and every subsystem drawing on it.
///
/// Driven from one thread: the host feeds inbound events through
/// [`InboundSink::apply`], pointer input through the `pointer_*` methods and
/// time through [`WorldScene::tick`].
pub struct WorldScene<C: CullingBackend = InlineCuller> {
    config: MapConfig,
    stage: SceneStage,
    tweens: Tweens,
    atlas: TextureAtlas,
    camera: CameraController,
    culler: C,
    scheduler: RegenScheduler,
    tiles: TileVirtualizer,
    players: PlayerSubsystem,
    buildings: BuildingSubsystem,
    roster: Roster,
    bus: EventBus,
    inbox: Subscription,
    now: Duration,
    asleep: bool,
    overlays_initialized: bool,
    hovered: Option<VisualId>,
    interior_requests: Vec<InteriorRequest>,
}

impl WorldScene<InlineCuller> {
    /// Scene that culls on the calling thread and owns a private bus.
    pub fn headless(config: MapConfig) -> Result<Self, ConfigError> {
        Self::new(config, EventBus::new(), InlineCuller::new())
    }
}

impl<C: CullingBackend> WorldScene<C> {
    pub fn new(config: MapConfig, bus: EventBus, culler: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let inbox = bus.subscribe(&[Topic::PlayerSelected, Topic::BuildingSelected]);
        let mut scheduler = RegenScheduler::new(config.regen_debounce());
        scheduler.request(Duration::ZERO);
        tracing::info!(cell_size = config.cell_size, road_modulus = config.road_modulus, "world scene created");
        Ok(Self {
            stage: SceneStage::new(),
            tweens: Tweens::new(),
            atlas: TextureAtlas::new(),
            camera: CameraController::from_config(&config),
            culler,
            scheduler,
            tiles: TileVirtualizer::new(&config),
            players: PlayerSubsystem::new(&config),
            buildings: BuildingSubsystem::new(&config),
            roster: Roster::new(),
            bus,
            inbox,
            now: Duration::ZERO,
            asleep: false,
            overlays_initialized: false,
            hovered: None,
            interior_requests: Vec::new(),
            config,
        })
    }

    /// Advance scene time by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        self.now += dt;
        self.tweens.advance(dt, &mut self.stage);
        if !self.asleep {
            self.players.animate(dt, &mut self.stage);
        }
        for signal in self.camera.advance(dt) {
            match signal {
                CameraSignal::Regenerate => self.scheduler.request(self.now),
                CameraSignal::PanCompleted => tracing::trace!("pan completed"),
            }
        }
        self.handle_bus();
        self.pump_culling();
        self.tiles.flush_retirements(self.now, &mut self.stage);
    }

    fn handle_bus(&mut self) {
        for event in self.inbox.drain() {
            match event {
                BusEvent::PlayerSelected(Some(player)) => self.focus_player(&player),
                BusEvent::PlayerSelected(None) => {
                    self.players.clear_selection(&mut self.stage, &mut self.tweens)
                }
                BusEvent::BuildingSelected(building) => self.focus_building(&building),
                _ => {}
            }
        }
    }

    fn pump_culling(&mut self) {
        if let Some(seq) = self.scheduler.poll(self.now) {
            let (origin, size) = self.camera.world_view();
            let request =
                CullRequest::new(seq, origin, size, self.config.cell_size, self.config.cull_buffer);
            if let Err(err) = self.culler.submit(request) {
                tracing::warn!(seq, %err, "culling request failed");
                self.scheduler.abandon();
            }
        }
        loop {
            match self.culler.poll() {
                Ok(Some(response)) => {
                    if !self.scheduler.complete(response.seq, self.now) {
                        continue;
                    }
                    match response.range {
                        Ok(range) => {
                            self.tiles.resync(range, self.now, &mut self.stage);
                        }
                        Err(err) => tracing::warn!(seq = response.seq, %err, "culling failed"),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "culling backend unavailable");
                    self.scheduler.abandon();
                    break;
                }
            }
        }
    }

    /// Highlight `player` (if not already) and pan to it.
    fn focus_player(&mut self, player: &PlayerId) {
        self.players.select(player, &mut self.stage, &mut self.tweens);
        let Some(position) = self.players.position(player, &self.stage) else {
            tracing::debug!(%player, "selected player is not on the map");
            return;
        };
        self.camera
            .pan_to(position, None, self.config.pan_duration(), Ease::SineInOut);
    }

    fn focus_building(&mut self, building: &BuildingId) {
        let Some(point) = self.buildings.focus_point(building) else {
            tracing::debug!(%building, "selected building is not on the map");
            return;
        };
        self.camera.pan_to(
            point,
            Some(self.config.pan_zoom),
            self.config.pan_duration(),
            Ease::SineInOut,
        );
    }

    /// Carry out a listener action.
    pub fn handle_action(&mut self, action: UiAction) {
        tracing::debug!(?action, "ui action");
        match action {
            UiAction::SelectPlayer(player) => {
                if self.players.selected() == Some(&player) {
                    return;
                }
                self.players.select(&player, &mut self.stage, &mut self.tweens);
                self.bus.publish(BusEvent::PlayerSelected(Some(player)));
            }
            UiAction::OpenBuildingInfo(building) => {
                self.bus.publish(BusEvent::BuildingSelected(building.clone()));
                self.bus
                    .publish(BusEvent::PanelSwitch(Panel::BuildingInfo(building)));
            }
            UiAction::FocusBuilding(building) => {
                self.bus.publish(BusEvent::BuildingSelected(building));
            }
            UiAction::HoverOverlay { building, hovered } => {
                self.buildings.set_hover(&building, hovered, &mut self.stage);
            }
            UiAction::EnterBuilding(building) => {
                let Some(player) = self.roster.occupants_of(&building).first().map(|p| (*p).clone())
                else {
                    tracing::debug!(%building, "nobody inside, ignoring house click");
                    return;
                };
                tracing::info!(%building, player = %player.id, "interior requested");
                self.interior_requests.push(InteriorRequest { building, player });
            }
            UiAction::ZoomIn => self.camera.zoom_in(),
            UiAction::ZoomOut => self.camera.zoom_out(),
        }
    }

    /// Press at a screen point: clicks the topmost listener, or starts a drag.
    pub fn pointer_down(&mut self, screen: Vec2) -> Vec<UiAction> {
        let world = self.camera.screen_to_world(screen);
        let Some(hit) = self.stage.hit_test(world, PointerEvent::Down) else {
            self.camera.pointer_down(screen);
            return Vec::new();
        };
        let actions = self.stage.dispatch(hit, PointerEvent::Down);
        for action in &actions {
            self.handle_action(action.clone());
        }
        actions
    }

    /// Drag the camera, or track hover when not dragging.
    pub fn pointer_move(&mut self, screen: Vec2) {
        if let Some(CameraSignal::Regenerate) = self.camera.pointer_move(screen) {
            self.scheduler.request(self.now);
            return;
        }
        let world = self.camera.screen_to_world(screen);
        let over = self.stage.hit_test(world, PointerEvent::Over);
        if over == self.hovered {
            return;
        }
        let mut actions = Vec::new();
        if let Some(previous) = self.hovered {
            actions.extend(self.stage.dispatch(previous, PointerEvent::Out));
        }
        if let Some(current) = over {
            actions.extend(self.stage.dispatch(current, PointerEvent::Over));
        }
        self.hovered = over;
        for action in actions {
            self.handle_action(action);
        }
    }

    pub fn pointer_up(&mut self) {
        self.camera.pointer_up();
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.camera.wheel(delta_y);
    }

    pub fn zoom_in(&mut self) {
        self.handle_action(UiAction::ZoomIn);
    }

    pub fn zoom_out(&mut self) {
        self.handle_action(UiAction::ZoomOut);
    }

    pub fn resize(&mut self, viewport: Vec2) {
        if self.camera.resize(viewport) == CameraSignal::Regenerate {
            self.scheduler.request(self.now);
        }
    }

    /// Stop applying player snapshots to visuals, e.g. while an interior is shown.
    /// The roster keeps updating.
    pub fn sleep(&mut self) {
        tracing::debug!("world scene sleeping");
        self.asleep = true;
    }

    /// Resume and catch the visuals up with the roster.
    pub fn wake(&mut self) {
        if !self.asleep {
            return;
        }
        self.asleep = false;
        tracing::debug!(players = self.roster.player_count(), "world scene waking");
        if self.roster.player_snapshots() == 0 {
            return;
        }
        self.players.apply(
            self.roster.snapshot_players(),
            SnapshotMode::Full,
            &mut self.stage,
            &mut self.tweens,
        );
        self.sync_all_occupants();
        self.overlays_initialized = true;
        self.publish_world_state();
    }

    fn apply_players(&mut self, players: Vec<PlayerState>, partial: bool) {
        let changes = self.roster.apply_players(&players, partial);
        let frame: Arc<[PlayerState]> = players.into();

        if self.asleep {
            tracing::trace!(players = frame.len(), "asleep, visuals not updated");
        } else {
            let mode = if partial { SnapshotMode::Partial } else { SnapshotMode::Full };
            let report = self
                .players
                .apply(frame.to_vec(), mode, &mut self.stage, &mut self.tweens);
            tracing::debug!(
                created = report.created.len(),
                updated = report.updated.len(),
                recycled = report.recycled.len(),
                "players applied"
            );

            if !self.overlays_initialized {
                self.sync_all_occupants();
                self.overlays_initialized = true;
            } else {
                let touched: BTreeSet<BuildingId> =
                    changes.iter().flat_map(|c| c.touched()).cloned().collect();
                for building in touched {
                    self.sync_occupants(&building);
                }
            }
            if !changes.is_empty() {
                self.publish_world_state();
            }
        }
        self.bus.publish(BusEvent::PlayersUpdated(frame));
    }

    fn apply_buildings(&mut self, buildings: Vec<BuildingState>) {
        self.roster.apply_buildings(&buildings);
        let report = self.buildings.apply(buildings, &mut self.stage, &self.atlas);
        tracing::debug!(
            created = report.created.len(),
            updated = report.updated.len(),
            recycled = report.recycled.len(),
            skipped = report.skipped.len(),
            "buildings applied"
        );
        let entrances: Vec<CellCoord> = self.buildings.entrances().collect();
        self.tiles.set_exclusion_zones(entrances, &mut self.stage);
    }

    /// Stand in the last known record for every `held` player whose frame
    /// record could not be decoded, so a full snapshot keeps it unchanged.
    fn keep_held_players(
        &self,
        mut players: Vec<PlayerState>,
        held: Vec<PlayerId>,
    ) -> Vec<PlayerState> {
        for id in held {
            if players.iter().any(|p| p.id == id) {
                continue;
            }
            match self.roster.player(&id) {
                Some(last) => players.push(last.clone()),
                None => tracing::debug!(%id, "undecodable record for an unknown player"),
            }
        }
        players
    }

    fn keep_held_buildings(
        &self,
        mut buildings: Vec<BuildingState>,
        held: Vec<BuildingId>,
    ) -> Vec<BuildingState> {
        for id in held {
            if buildings.iter().any(|b| b.id == id) {
                continue;
            }
            match self.roster.building(&id) {
                Some(last) => buildings.push(last.clone()),
                None => tracing::debug!(%id, "undecodable record for an unknown building"),
            }
        }
        buildings
    }

    fn occupant_names(&self, building: &BuildingId) -> Vec<String> {
        self.roster
            .occupants_of(building)
            .iter()
            .map(|p| p.display_name().to_string())
            .collect()
    }

    fn sync_occupants(&mut self, building: &BuildingId) {
        let names = self.occupant_names(building);
        self.buildings.set_occupants(building, names, &mut self.stage);
    }

    /// Rebuild every occupant overlay from the roster.
    fn sync_all_occupants(&mut self) {
        let mut ids: BTreeSet<BuildingId> = self.roster.occupied_buildings().into_keys().collect();
        ids.extend(self.buildings.ids().cloned());
        for building in ids {
            self.sync_occupants(&building);
        }
    }

    fn publish_world_state(&self) {
        let roster: Arc<[PlayerState]> = self.roster.snapshot_players().into();
        self.bus.publish(BusEvent::WorldStateChanged(roster));
    }

    /// Interior transitions requested since the last call.
    pub fn take_interior_requests(&mut self) -> Vec<InteriorRequest> {
        std::mem::take(&mut self.interior_requests)
    }

    pub fn view(&self) -> RenderView {
        RenderView {
            scroll: self.camera.scroll(),
            zoom: self.camera.zoom(),
            viewport: self.camera.viewport(),
        }
    }

    pub fn render<R: Renderer<UiAction>>(&self, renderer: &R) -> R::Output {
        renderer.render(&self.stage, &self.view())
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn stage(&self) -> &SceneStage {
        &self.stage
    }

    pub fn tweens(&self) -> &Tweens {
        &self.tweens
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn tiles(&self) -> &TileVirtualizer {
        &self.tiles
    }

    pub fn players(&self) -> &PlayerSubsystem {
        &self.players
    }

    pub fn buildings(&self) -> &BuildingSubsystem {
        &self.buildings
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    pub fn regen_pending(&self) -> bool {
        self.scheduler.is_pending() || self.scheduler.in_flight().is_some()
    }
}

impl<C: CullingBackend> InboundSink for WorldScene<C> {
    fn apply(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Players {
                players,
                held,
                partial,
                rejected,
            } => {
                if rejected > 0 {
                    tracing::warn!(rejected, held = held.len(), "player records skipped");
                }
                let players = self.keep_held_players(players, held);
                self.apply_players(players, partial);
            }
            InboundEvent::Buildings {
                buildings,
                held,
                rejected,
            } => {
                if rejected > 0 {
                    tracing::warn!(rejected, held = held.len(), "building records skipped");
                }
                let buildings = self.keep_held_buildings(buildings, held);
                self.apply_buildings(buildings);
            }
            InboundEvent::Chat(data) => {
                self.bus.publish(BusEvent::Chat(data));
            }
            InboundEvent::TickEnd => {}
            InboundEvent::Other { kind, data } => {
                self.bus.publish(BusEvent::Forwarded { kind, data });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scene() -> WorldScene {
        WorldScene::headless(MapConfig::default()).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn players(value: serde_json::Value) -> InboundEvent {
        InboundEvent::from_value(json!({ "type": "players", "data": value })).unwrap()
    }

    fn buildings(value: serde_json::Value) -> InboundEvent {
        InboundEvent::from_value(json!({ "type": "buildings", "data": value })).unwrap()
    }

    /// Screen point over the given render-space point.
    fn screen_of(scene: &WorldScene, world: Vec2) -> Vec2 {
        (world - scene.camera().scroll()) * scene.camera().zoom()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = MapConfig {
            cell_size: 0.0,
            ..MapConfig::default()
        };
        assert!(WorldScene::headless(config).is_err());
    }

    #[test]
    fn tiles_appear_after_debounce() {
        let mut scene = scene();
        scene.tick(ms(100));
        assert_eq!(scene.tiles().active_cells(), 0);
        scene.tick(ms(150));
        assert!(scene.tiles().active_cells() > 0);
        assert!(!scene.regen_pending());
    }

    #[test]
    fn clicking_a_player_selects_and_pans() {
        let mut scene = scene();
        let bus = scene.bus().clone();
        let mut panel = bus.subscribe(&[Topic::PlayerSelected]);
        scene.apply(players(json!([{ "playerID": 42, "locationX": 5, "locationY": 5 }])));

        let body = scene.players().position(&PlayerId::from(42u64), scene.stage()).unwrap();
        let actions = scene.pointer_down(screen_of(&scene, body));
        assert_eq!(actions, vec![UiAction::SelectPlayer(PlayerId::from(42u64))]);
        assert_eq!(scene.players().selected(), Some(&PlayerId::from(42u64)));
        assert_eq!(
            panel.drain(),
            vec![BusEvent::PlayerSelected(Some(PlayerId::from(42u64)))]
        );

        scene.tick(ms(16));
        assert!(scene.camera().is_panning());
        scene.tick(ms(1000));
        assert!((scene.camera().center() - body).length() < 0.01);

        // clicking again publishes nothing
        scene.pointer_down(screen_of(&scene, body));
        assert!(panel.drain().is_empty());
    }

    #[test]
    fn deselect_from_panel_clears_highlight() {
        let mut scene = scene();
        scene.apply(players(json!([{ "playerID": 1, "locationX": 0, "locationY": 0 }])));
        scene.handle_action(UiAction::SelectPlayer(PlayerId::from(1u64)));
        scene.bus().publish(BusEvent::PlayerSelected(None));
        scene.tick(ms(16));
        assert!(scene.players().selected().is_none());
    }

    #[test]
    fn label_click_opens_building_panel() {
        let mut scene = scene();
        let mut panel = scene.bus().subscribe(&[Topic::BuildingSelected, Topic::PanelSwitch]);
        scene.apply(buildings(json!([
            { "id": 17, "name": "Diner", "type": "business", "capabilities": ["eat"], "entrance": { "x": 2, "y": 2 } }
        ])));
        scene.handle_action(UiAction::OpenBuildingInfo(BuildingId::from(17u64)));
        assert_eq!(
            panel.drain(),
            vec![
                BusEvent::BuildingSelected(BuildingId::from(17u64)),
                BusEvent::PanelSwitch(Panel::BuildingInfo(BuildingId::from(17u64))),
            ]
        );

        scene.tick(ms(16));
        assert!(scene.camera().is_panning());
        scene.tick(ms(1000));
        assert!((scene.camera().zoom() - 0.9).abs() < 1e-4);
    }

    #[test]
    fn kept_building_keeps_its_exclusion_zone() {
        let mut scene = scene();
        let diner = BuildingId::from(17u64);
        scene.apply(buildings(json!([
            { "id": 17, "name": "Diner", "type": "business", "entrance": { "x": 2, "y": 2 } }
        ])));
        assert!(scene.tiles().is_excluded(CellCoord::new(2, 2)));

        // unusable entrance: the old object stays, and so does its zone
        scene.apply(buildings(json!([{ "id": 17, "name": "Diner", "entrance": { "x": "left" } }])));
        assert!(scene.buildings().get(&diner).is_some());
        assert!(scene.tiles().is_excluded(CellCoord::new(2, 2)));

        // undecodable record: the last known state stands in for it
        scene.apply(buildings(json!([{ "id": 17, "name": 5 }])));
        assert_eq!(scene.buildings().len(), 1);
        assert_eq!(scene.roster().building(&diner).map(|b| b.name.as_str()), Some("Diner"));
        assert!(scene.tiles().is_excluded(CellCoord::new(2, 2)));

        scene.apply(buildings(json!([])));
        assert!(scene.buildings().is_empty());
        assert!(!scene.tiles().is_excluded(CellCoord::new(2, 2)));
    }

    #[test]
    fn building_at_the_grid_edge_leaves_tiles_alone() {
        let config = MapConfig {
            decoration_chance: 1.0,
            ..MapConfig::default()
        };
        let mut scene = WorldScene::headless(config).unwrap();
        scene.tick(ms(250));
        let decorations = scene.tiles().decoration_count();
        assert!(decorations > 0);

        scene.apply(buildings(json!([
            { "id": 1, "name": "Edge", "entrance": { "x": 2147483647, "y": 2147483647 } },
            { "id": 2, "name": "Far", "entrance": { "x": -1.0e12, "y": 1.0e12 } }
        ])));
        assert_eq!(scene.buildings().len(), 2);
        assert_eq!(scene.tiles().decoration_count(), decorations);
    }

    #[test]
    fn house_click_requests_interior_only_when_occupied() {
        let mut scene = scene();
        scene.apply(buildings(json!([
            { "id": 17, "name": "Diner", "type": "business", "entrance": { "x": 2, "y": 2 } }
        ])));
        scene.handle_action(UiAction::EnterBuilding(BuildingId::from(17u64)));
        assert!(scene.take_interior_requests().is_empty());

        scene.apply(players(json!([
            { "playerID": 42, "name": "Alice", "locationX": 2, "locationY": 2, "buildingID": 17 }
        ])));
        scene.handle_action(UiAction::EnterBuilding(BuildingId::from(17u64)));
        let requests = scene.take_interior_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].player.id, PlayerId::from(42u64));
    }

    #[test]
    fn hover_over_overlay_raises_alpha() {
        let mut scene = scene();
        scene.apply(buildings(json!([
            { "id": 17, "name": "Diner", "type": "business", "entrance": { "x": 2, "y": 2 } }
        ])));
        scene.apply(players(json!([
            { "playerID": 42, "name": "Alice", "locationX": 2, "locationY": 2, "buildingID": 17 }
        ])));
        let building = BuildingId::from(17u64);
        let background = scene.buildings().overlay(&building).unwrap().background;
        let centre = scene.stage().world_position(background).unwrap();

        scene.pointer_move(screen_of(&scene, centre));
        assert_eq!(scene.stage().get(background).unwrap().alpha, 0.6);
        scene.pointer_move(Vec2::new(-5000.0, -5000.0));
        assert_eq!(scene.stage().get(background).unwrap().alpha, 0.5);
    }

    #[test]
    fn sleeping_scene_catches_up_on_wake() {
        let mut scene = scene();
        scene.apply(players(json!([{ "playerID": 1, "locationX": 0, "locationY": 0 }])));
        scene.sleep();
        scene.apply(players(json!([
            { "playerID": 1, "locationX": 0, "locationY": 0, "buildingID": 9 },
            { "playerID": 2, "locationX": 3, "locationY": 3 }
        ])));
        assert_eq!(scene.players().len(), 1);
        assert!(scene.players().is_visible(&PlayerId::from(1u64), scene.stage()));

        scene.wake();
        assert_eq!(scene.players().len(), 2);
        assert!(!scene.players().is_visible(&PlayerId::from(1u64), scene.stage()));
        assert_eq!(
            scene.buildings().occupant_names(&BuildingId::from(9u64)),
            ["Unknown Player".to_string()]
        );
    }

    #[test]
    fn chat_and_unknown_types_are_forwarded() {
        let mut scene = scene();
        let mut sub = scene.bus().subscribe(&[Topic::Chat, Topic::Forwarded]);
        scene.apply(InboundEvent::parse(r#"{"type":"chat","data":{"text":"hi"}}"#).unwrap());
        scene.apply(InboundEvent::parse(r#"{"type":"leaderboard","data":[1,2]}"#).unwrap());
        scene.apply(InboundEvent::TickEnd);
        let events = sub.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], BusEvent::Chat(json!({ "text": "hi" })));
        assert!(matches!(&events[1], BusEvent::Forwarded { kind, .. } if kind == "leaderboard"));
    }
}
