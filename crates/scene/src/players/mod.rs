//! Player sprites: movement tweens, walk cycles, equipment and selection.

mod animation;
mod equipment;
mod selection;

pub use animation::{
    AnimationSet, Animator, Clip, Direction, FRAME_RATE, IDLE_FRAME, MotionState, infer_motion,
};
pub use equipment::Loadout;
pub use selection::{HIGHLIGHT_TINT, Selection};

use glam::Vec2;
use std::time::Duration;
use worldmap_common::{CoordinateMapper, Ease, MapConfig, PlayerId};
use worldmap_ecs::{DiffEngine, DiffReport, Materializer, SnapshotMode};
use worldmap_input::UiAction;
use worldmap_kernel::PlayerState;
use worldmap_render::{
    PointerEvent, PoolStats, PropKind, TweenProp, TweenSpec, Tweens, Visual, VisualId,
    VisualPool, depth,
};

use crate::SceneStage;

const HIT_AREA: Vec2 = Vec2::new(24.0, 36.0);
const SHADOW_OFFSET: Vec2 = Vec2::new(0.0, 18.0);
const LABEL_OFFSET: Vec2 = Vec2::new(0.0, -30.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlayerPart {
    /// Container with shadow, character and label children.
    Body,
}

/// Render state of one materialized player.
#[derive(Debug)]
pub struct PlayerObject {
    pub body: VisualId,
    pub shadow: VisualId,
    pub character: VisualId,
    pub label: VisualId,
    pub animator: Animator,
    pub loadout: Loadout,
    /// Cell centre the body is heading for.
    pub target: Vec2,
}

fn label_text(record: &PlayerState) -> String {
    let name = record.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Player");
    format!("{name}<{}>", record.id)
}

fn write_frame(stage: &mut SceneStage, object: &PlayerObject) {
    let (texture, frame) = object.animator.current();
    stage.update(object.character, |v| {
        if v.texture.as_deref() != Some(texture) {
            v.texture = Some(texture.to_string());
        }
        v.frame = frame;
    });
}

struct PlayerMaterializer<'a> {
    stage: &'a mut SceneStage,
    tweens: &'a mut Tweens,
    pool: &'a mut VisualPool<PlayerPart>,
    selection: &'a mut Selection,
    mapper: CoordinateMapper,
    move_threshold: f32,
    move_tween: Duration,
}

impl PlayerMaterializer<'_> {
    fn target_of(&self, record: &PlayerState) -> Vec2 {
        self.mapper.cell_center(record.x, record.y)
    }
}

impl Materializer<PlayerState> for PlayerMaterializer<'_> {
    type Object = PlayerObject;

    fn create(&mut self, record: &PlayerState) -> Option<PlayerObject> {
        let body = self.pool.acquire(PlayerPart::Body, self.stage, |s| {
            let body = s.spawn(Visual::container());
            s.spawn_child(body, Visual::sprite("ground2"));
            s.spawn_child(body, Visual::sprite("p1"));
            s.spawn_child(body, Visual::text(""));
            body
        });
        let &[shadow, character, label] = self.stage.children(body) else {
            tracing::warn!(player = %record.id, "pooled player body lost its children");
            self.stage.destroy(body);
            return None;
        };

        let target = self.target_of(record);
        self.stage.update(body, |v| {
            v.position = target;
            v.size = Some(HIT_AREA);
            v.depth = depth::PLAYER_BASE;
            v.visible = record.building_id.is_none();
        });
        self.stage.update(shadow, |v| {
            v.texture = Some("ground2".to_string());
            v.position = SHADOW_OFFSET;
            v.scale = 0.4;
            v.depth = depth::PLAYER_SHADOW;
        });
        self.stage.update(character, |v| v.depth = depth::PLAYER_SPRITE);
        let text = label_text(record);
        self.stage.update(label, |v| {
            v.text = text;
            v.position = LABEL_OFFSET;
            v.depth = depth::PLAYER_TEXT;
        });
        self.stage
            .on(body, PointerEvent::Down, UiAction::SelectPlayer(record.id.clone()));

        let mut loadout = Loadout::default();
        loadout.reconcile(record);
        let object = PlayerObject {
            body,
            shadow,
            character,
            label,
            animator: Animator::new(loadout.animation_set()),
            loadout,
            target,
        };
        write_frame(self.stage, &object);
        tracing::debug!(player = %record.id, x = record.x, y = record.y, "player created");
        Some(object)
    }

    fn changed(&self, old: &PlayerState, new: &PlayerState) -> bool {
        old.x != new.x
            || old.y != new.y
            || old.name != new.name
            || old.building_id != new.building_id
            || old.equipment_ids() != new.equipment_ids()
    }

    fn update(&mut self, object: &mut PlayerObject, old: &PlayerState, new: &PlayerState) {
        if old.name != new.name {
            let text = label_text(new);
            self.stage.update(object.label, |v| v.text = text);
        }
        if old.equipment_ids() != new.equipment_ids() {
            if let Some(set) = object.loadout.reconcile(new) {
                tracing::debug!(player = %new.id, ?set, "animation set changed");
                object.animator.set_animation_set(set);
            }
        }
        if old.building_id != new.building_id {
            tracing::debug!(player = %new.id, from = ?old.building_id, to = ?new.building_id, "player changed building");
        }
    }

    fn refresh(&mut self, object: &mut PlayerObject, record: &PlayerState) {
        let target = self.target_of(record);
        let current = self
            .stage
            .get(object.body)
            .map(|v| v.position)
            .unwrap_or(target);

        if target != object.target {
            self.tweens.kill_prop_of(object.body, PropKind::Position);
            self.tweens.add(
                object.body,
                TweenSpec::new(
                    TweenProp::Position { from: current, to: target },
                    self.move_tween,
                    Ease::CubicOut,
                ),
            );
            object.target = target;
        }

        object
            .animator
            .apply(infer_motion(target - current, self.move_threshold));
        write_frame(self.stage, object);

        let outside = record.building_id.is_none();
        self.stage.update(object.body, |v| v.visible = outside);
    }

    fn recycle(&mut self, object: PlayerObject, record: &PlayerState) {
        self.selection.forget(&record.id, self.stage, self.tweens);
        self.tweens.kill_tweens_of(object.body);
        self.tweens.kill_tweens_of(object.character);
        self.pool.release(PlayerPart::Body, object.body, self.stage);
        tracing::debug!(player = %record.id, "player recycled");
    }
}

/// Materialized players keyed by id.
pub struct PlayerSubsystem {
    engine: DiffEngine<PlayerState, PlayerObject>,
    pool: VisualPool<PlayerPart>,
    selection: Selection,
    mapper: CoordinateMapper,
    move_threshold: f32,
    move_tween: Duration,
}

impl PlayerSubsystem {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            engine: DiffEngine::new("players"),
            pool: VisualPool::new(),
            selection: Selection::default(),
            mapper: CoordinateMapper::new(config.cell_size),
            move_threshold: config.move_threshold,
            move_tween: config.move_tween(),
        }
    }

    /// Reconcile with a player snapshot and re-infer every player's motion.
    pub fn apply(
        &mut self,
        records: Vec<PlayerState>,
        mode: SnapshotMode,
        stage: &mut SceneStage,
        tweens: &mut Tweens,
    ) -> DiffReport<PlayerId> {
        let mut materializer = PlayerMaterializer {
            stage,
            tweens,
            pool: &mut self.pool,
            selection: &mut self.selection,
            mapper: self.mapper,
            move_threshold: self.move_threshold,
            move_tween: self.move_tween,
        };
        self.engine.apply_snapshot(records, mode, &mut materializer)
    }

    /// Advance walk cycles. Players that reached their target stop here
    /// rather than waiting for the next snapshot.
    pub fn animate(&mut self, dt: Duration, stage: &mut SceneStage) {
        for (_, _, object) in self.engine.iter_mut() {
            let arrived = stage
                .get(object.body)
                .is_some_and(|v| v.position.distance(object.target) <= self.move_threshold);
            if arrived {
                object.animator.stop();
            } else {
                object.animator.advance(dt);
            }
            write_frame(stage, object);
        }
    }

    /// Highlight `player`. Returns false if it is unknown or already selected.
    pub fn select(&mut self, player: &PlayerId, stage: &mut SceneStage, tweens: &mut Tweens) -> bool {
        let Some(object) = self.engine.get(player) else {
            tracing::debug!(%player, "cannot select unknown player");
            return false;
        };
        self.selection.highlight(player, object.character, stage, tweens)
    }

    pub fn clear_selection(&mut self, stage: &mut SceneStage, tweens: &mut Tweens) {
        self.selection.clear(stage, tweens);
    }

    pub fn selected(&self) -> Option<&PlayerId> {
        self.selection.selected()
    }

    pub fn get(&self, player: &PlayerId) -> Option<&PlayerObject> {
        self.engine.get(player)
    }

    pub fn record(&self, player: &PlayerId) -> Option<&PlayerState> {
        self.engine.record(player)
    }

    /// Current render-space position of the player's body.
    pub fn position(&self, player: &PlayerId, stage: &SceneStage) -> Option<Vec2> {
        self.get(player)
            .and_then(|p| stage.get(p.body))
            .map(|v| v.position)
    }

    pub fn is_visible(&self, player: &PlayerId, stage: &SceneStage) -> bool {
        self.get(player)
            .is_some_and(|p| stage.get(p.body).is_some_and(|v| v.visible))
    }

    pub fn motion(&self, player: &PlayerId) -> Option<MotionState> {
        self.get(player).map(|p| p.animator.state())
    }

    /// Every materialized player whose visibility disagrees with its record.
    pub fn occupancy_violations(&self, stage: &SceneStage) -> Vec<PlayerId> {
        self.engine
            .iter()
            .filter(|(_, record, object)| {
                let visible = stage.get(object.body).is_some_and(|v| v.visible);
                visible != record.building_id.is_none()
            })
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.engine.iter().map(|(id, _, _)| id)
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldmap_common::BuildingId;

    struct Fixture {
        players: PlayerSubsystem,
        stage: SceneStage,
        tweens: Tweens,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                players: PlayerSubsystem::new(&MapConfig::default()),
                stage: SceneStage::new(),
                tweens: Tweens::new(),
            }
        }

        fn apply(&mut self, records: Vec<PlayerState>, mode: SnapshotMode) -> DiffReport<PlayerId> {
            self.players
                .apply(records, mode, &mut self.stage, &mut self.tweens)
        }

        fn tick(&mut self, ms: u64) {
            let dt = Duration::from_millis(ms);
            self.tweens.advance(dt, &mut self.stage);
            self.players.animate(dt, &mut self.stage);
        }
    }

    fn pid(n: u64) -> PlayerId {
        PlayerId::from(n)
    }

    #[test]
    fn new_player_appears_idle_at_cell_centre() {
        let mut f = Fixture::new();
        let mut alice = PlayerState::new(1u64, 2.0, 3.0);
        alice.name = Some("Alice".into());
        f.apply(vec![alice], SnapshotMode::Full);

        assert_eq!(f.players.position(&pid(1), &f.stage), Some(Vec2::new(160.0, -160.0)));
        assert_eq!(f.players.motion(&pid(1)), Some(MotionState::Idle));
        let object = f.players.get(&pid(1)).unwrap();
        assert_eq!(f.stage.get(object.label).unwrap().text, "Alice<1>");
        let character = f.stage.get(object.character).unwrap();
        assert_eq!((character.texture.as_deref(), character.frame), (Some("p1"), IDLE_FRAME));
        assert_eq!(
            f.stage.dispatch(object.body, PointerEvent::Down),
            vec![UiAction::SelectPlayer(pid(1))]
        );
    }

    #[test]
    fn unnamed_player_label_falls_back() {
        let mut f = Fixture::new();
        f.apply(vec![PlayerState::new(7u64, 0.0, 0.0)], SnapshotMode::Full);
        let label = f.players.get(&pid(7)).unwrap().label;
        assert_eq!(f.stage.get(label).unwrap().text, "Player<7>");
    }

    #[test]
    fn moving_up_tweens_and_plays_up_clip() {
        let mut f = Fixture::new();
        f.apply(vec![PlayerState::new(1u64, 0.0, 0.0)], SnapshotMode::Full);
        f.apply(vec![PlayerState::new(1u64, 0.0, 2.0)], SnapshotMode::Full);
        assert_eq!(f.players.motion(&pid(1)), Some(MotionState::Moving(Direction::Up)));
        assert_eq!(f.tweens.len(), 1);

        f.tick(1750);
        assert_eq!(f.players.position(&pid(1), &f.stage), Some(Vec2::new(32.0, -96.0)));
        assert_eq!(f.players.motion(&pid(1)), Some(MotionState::Idle));
        let character = f.players.get(&pid(1)).unwrap().character;
        let visual = f.stage.get(character).unwrap();
        assert_eq!((visual.texture.as_deref(), visual.frame), (Some("p2"), IDLE_FRAME));
    }

    #[test]
    fn retargeting_replaces_the_move_tween() {
        let mut f = Fixture::new();
        f.apply(vec![PlayerState::new(1u64, 0.0, 0.0)], SnapshotMode::Full);
        f.apply(vec![PlayerState::new(1u64, 4.0, 0.0)], SnapshotMode::Full);
        f.tick(500);
        f.apply(vec![PlayerState::new(1u64, -4.0, 0.0)], SnapshotMode::Full);
        assert_eq!(f.tweens.len(), 1);
        assert_eq!(f.players.motion(&pid(1)), Some(MotionState::Moving(Direction::Left)));
    }

    #[test]
    fn building_id_controls_visibility() {
        let mut f = Fixture::new();
        let mut inside = PlayerState::new(1u64, 0.0, 0.0);
        inside.building_id = Some(BuildingId::from(17u64));
        f.apply(vec![inside.clone(), PlayerState::new(2u64, 1.0, 1.0)], SnapshotMode::Full);
        assert!(!f.players.is_visible(&pid(1), &f.stage));
        assert!(f.players.is_visible(&pid(2), &f.stage));

        inside.building_id = None;
        f.apply(vec![inside], SnapshotMode::Partial);
        assert!(f.players.is_visible(&pid(1), &f.stage));
        assert!(f.players.occupancy_violations(&f.stage).is_empty());
        assert_eq!(f.players.len(), 2);
    }

    #[test]
    fn vehicle_swaps_character_texture() {
        let mut f = Fixture::new();
        f.apply(vec![PlayerState::new(1u64, 0.0, 0.0)], SnapshotMode::Full);
        let mut biker = PlayerState::new(1u64, 0.0, 0.0);
        biker.equipped_items.insert(
            "vehicle".into(),
            serde_json::from_value(serde_json::json!({
                "isEquipped": true,
                "item": { "id": 3, "name": "Bike" }
            }))
            .unwrap(),
        );
        let report = f.apply(vec![biker], SnapshotMode::Full);
        assert_eq!(report.updated, vec![pid(1)]);
        let character = f.players.get(&pid(1)).unwrap().character;
        assert_eq!(f.stage.get(character).unwrap().texture.as_deref(), Some("Bike"));
    }

    #[test]
    fn recycled_player_drops_selection_and_tweens() {
        let mut f = Fixture::new();
        f.apply(vec![PlayerState::new(1u64, 0.0, 0.0)], SnapshotMode::Full);
        assert!(f.players.select(&pid(1), &mut f.stage, &mut f.tweens));
        f.apply(vec![PlayerState::new(1u64, 3.0, 0.0)], SnapshotMode::Full);
        assert_eq!(f.tweens.len(), 2);

        let report = f.apply(vec![PlayerState::new(2u64, 0.0, 0.0)], SnapshotMode::Full);
        assert_eq!(report.recycled, vec![pid(1)]);
        assert!(f.players.selected().is_none());
        assert!(f.tweens.is_empty());
        assert_eq!(f.players.pool_stats().reused, 1);
        let reused = f.players.get(&pid(2)).unwrap();
        assert_eq!(f.stage.get(reused.character).unwrap().tint, None);
    }
}
