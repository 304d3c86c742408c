//! End-to-end scenarios: transport frames in, stage state and bus events out.

use glam::Vec2;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use worldmap_common::{BuildingId, MapConfig, PlayerId};
use worldmap_ecs::SnapshotMode;
use worldmap_kernel::{InboundEvent, PlayerState};
use worldmap_render::{DebugTextRenderer, Tweens};
use worldmap_scene::players::IDLE_FRAME;
use worldmap_scene::{
    BusEvent, Direction, InboundPipeline, InboundSink, MessageQueue, MotionState, PlayerSubsystem,
    SceneInspector, SceneStage, Topic, WorldScene,
};
use worldmap_stream::CullingWorker;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn frame(kind: &str, data: serde_json::Value) -> InboundEvent {
    InboundEvent::from_value(json!({ "type": kind, "data": data })).unwrap()
}

fn player42_at(x: i32, y: i32) -> InboundEvent {
    frame("players", json!([{ "playerID": 42, "name": "Alice", "locationX": x, "locationY": y }]))
}

/// Texture and frame currently shown by player `id`'s character sprite.
fn shown_frame(scene: &WorldScene, id: &PlayerId) -> (String, u32) {
    let character = scene.players().get(id).unwrap().character;
    let visual = scene.stage().get(character).unwrap();
    (visual.texture.clone().unwrap_or_default(), visual.frame)
}

#[test]
fn player_walks_right_then_idles() {
    let mut scene = WorldScene::headless(MapConfig::default()).unwrap();
    let id = PlayerId::from(42u64);
    let walk_right = 5..=8;
    scene.apply(player42_at(5, 5));
    assert_eq!(scene.players().motion(&id), Some(MotionState::Idle));

    // one cell per frame, each arriving while the previous move is still running
    for x in 6..=8 {
        scene.apply(player42_at(x, 5));
        for _ in 0..2 {
            assert_eq!(scene.players().motion(&id), Some(MotionState::Moving(Direction::Right)));
            let (texture, frame) = shown_frame(&scene, &id);
            assert_eq!(texture, "p1");
            assert!(walk_right.contains(&frame), "frame {frame} outside the right-walk clip");
            scene.tick(ms(250));
        }
    }

    let target = scene.players().get(&id).unwrap().target;
    for _ in 0..8 {
        scene.tick(ms(250));
        // the server keeps resending the latest position
        scene.apply(player42_at(8, 5));
        let remaining = target - scene.players().position(&id, scene.stage()).unwrap();
        let motion = scene.players().motion(&id).unwrap();
        if remaining.length() > 1.0 {
            assert_eq!(motion, MotionState::Moving(Direction::Right));
        } else {
            assert_eq!(motion, MotionState::Idle);
        }
    }

    assert_eq!(scene.players().position(&id, scene.stage()), Some(target));
    assert_eq!(scene.players().motion(&id), Some(MotionState::Idle));
    assert_eq!(shown_frame(&scene, &id), ("p1".to_string(), IDLE_FRAME));
}

#[test]
fn undecodable_player_record_keeps_the_player() {
    let mut scene = WorldScene::headless(MapConfig::default()).unwrap();
    let id = PlayerId::from(42u64);
    let diner = BuildingId::from(17u64);
    scene.apply(frame(
        "players",
        json!([
            { "playerID": 42, "name": "Alice", "locationX": 5, "locationY": 5, "buildingID": 17 },
            { "playerID": 7, "locationX": 0, "locationY": 0 }
        ]),
    ));
    let body = scene.players().get(&id).unwrap().body;

    let broken = frame(
        "players",
        json!([
            { "playerID": 42, "locationX": "bad", "locationY": 5 },
            { "playerID": 7, "locationX": 1, "locationY": 0 }
        ]),
    );
    let InboundEvent::Players { held, rejected, .. } = &broken else {
        panic!("expected players");
    };
    assert_eq!(held, &vec![id.clone()]);
    assert_eq!(*rejected, 1);
    let pool_before = scene.players().pool_stats();
    scene.apply(broken);

    assert_eq!(scene.players().len(), 2);
    assert_eq!(scene.players().get(&id).unwrap().body, body);
    assert_eq!(scene.players().pool_stats(), pool_before);
    let record = scene.roster().player(&id).unwrap();
    assert_eq!((record.x, record.y), (5.0, 5.0));
    assert_eq!(record.building_id, Some(diner.clone()));
    assert!(!scene.players().is_visible(&id, scene.stage()));
    assert_eq!(scene.buildings().occupant_names(&diner), ["Alice".to_string()]);
    assert_eq!(scene.roster().player(&PlayerId::from(7u64)).unwrap().x, 1.0);

    // a later roster without the player still removes it
    scene.apply(frame("players", json!([{ "playerID": 7, "locationX": 1, "locationY": 0 }])));
    assert!(scene.players().get(&id).is_none());
}

#[test]
fn player_entering_building_updates_overlay_and_hides_sprite() {
    let mut scene = WorldScene::headless(MapConfig::default()).unwrap();
    let mut world = scene.bus().subscribe(&[Topic::WorldStateChanged]);
    let building = BuildingId::from(17u64);
    let id = PlayerId::from(42u64);

    scene.apply(frame(
        "buildings",
        json!({ "buildings": [
            { "id": 17, "name": "Diner", "type": "business", "capabilities": ["eat"], "entrance": { "x": 4, "y": 4 } }
        ]}),
    ));
    scene.apply(player42_at(4, 4));
    world.drain();
    assert!(scene.buildings().overlay(&building).is_none());

    scene.apply(frame(
        "players",
        json!({ "playerID": 42, "name": "Alice", "locationX": 4, "locationY": 4, "buildingID": 17 }),
    ));
    assert_eq!(
        scene.buildings().overlay_text(&building, scene.stage()),
        Some("Diner\n1 player inside\nAlice")
    );
    assert!(!scene.players().is_visible(&id, scene.stage()));

    let events = world.drain();
    assert_eq!(events.len(), 1);
    let BusEvent::WorldStateChanged(roster) = &events[0] else {
        panic!("expected world state");
    };
    assert_eq!(roster[0].building_id, Some(building.clone()));

    scene.apply(player42_at(4, 4));
    assert!(scene.buildings().overlay(&building).is_none());
    assert!(scene.players().is_visible(&id, scene.stage()));
}

#[tokio::test]
async fn burst_of_frames_applies_only_the_newest() {
    let mut scene = WorldScene::headless(MapConfig::default()).unwrap();
    let mut updates = scene.bus().subscribe(&[Topic::PlayersUpdated]);
    let queue = Arc::new(MessageQueue::new());
    for x in 1..=3 {
        queue
            .enqueue(format!(r#"{{"type":"players","data":[{{"playerID":7,"locationX":{x},"locationY":0}}]}}"#))
            .unwrap();
    }

    let mut pipeline = InboundPipeline::new(Arc::clone(&queue));
    pipeline.drain(&mut scene).await;

    assert_eq!(pipeline.stats().applied, 1);
    assert_eq!(pipeline.stats().skipped, 2);
    let record = scene.roster().player(&PlayerId::from(7u64)).unwrap();
    assert_eq!(record.x, 3.0);
    assert_eq!(updates.drain().len(), 1);
}

#[test]
fn occupancy_invariant_holds_after_every_snapshot() {
    let mut scene = WorldScene::headless(MapConfig::default()).unwrap();
    let snapshots = [
        json!([
            { "playerID": 1, "locationX": 0, "locationY": 0 },
            { "playerID": 2, "locationX": 1, "locationY": 0, "buildingID": 5 }
        ]),
        json!({ "playerID": 1, "locationX": 0, "locationY": 0, "buildingID": "5" }),
        json!([
            { "playerID": 2, "locationX": 1, "locationY": 0, "buildingID": "" },
            { "playerID": 3, "locationX": 2, "locationY": 2, "buildingID": 6 }
        ]),
        json!({ "playerID": 3, "locationX": 2, "locationY": 2, "buildingID": null }),
    ];
    for data in snapshots {
        scene.apply(frame("players", data));
        assert!(scene.players().occupancy_violations(scene.stage()).is_empty());
    }
    assert_eq!(scene.players().len(), 2);
    assert!(scene.buildings().occupant_names(&BuildingId::from(5u64)).is_empty());
}

#[test]
fn diff_recycles_missing_and_creates_new_players() {
    let mut players = PlayerSubsystem::new(&MapConfig::default());
    let mut stage = SceneStage::new();
    let mut tweens = Tweens::new();
    let snapshot = |ids: &[(u64, f32)]| -> Vec<PlayerState> {
        ids.iter().map(|&(id, x)| PlayerState::new(id, x, 0.0)).collect()
    };

    players.apply(snapshot(&[(1, 0.0), (2, 0.0), (3, 0.0)]), SnapshotMode::Full, &mut stage, &mut tweens);
    let report = players.apply(
        snapshot(&[(2, 1.0), (3, 0.0), (4, 0.0)]),
        SnapshotMode::Full,
        &mut stage,
        &mut tweens,
    );

    assert_eq!(report.created, vec![PlayerId::from(4u64)]);
    assert_eq!(report.recycled, vec![PlayerId::from(1u64)]);
    assert_eq!(report.updated, vec![PlayerId::from(2u64)]);
    assert_eq!(report.unchanged, vec![PlayerId::from(3u64)]);
    assert_eq!(players.pool_stats().reused, 1);
    assert_eq!(players.len(), 3);
}

#[test]
fn dragging_regenerates_and_retires_tiles() {
    let mut scene = WorldScene::headless(MapConfig::default()).unwrap();
    scene.tick(ms(250));
    let first = scene.tiles().current_range().unwrap();

    scene.pointer_down(Vec2::new(600.0, 300.0));
    scene.pointer_move(Vec2::new(100.0, 300.0));
    scene.pointer_up();
    // the scroll threshold re-arms the debounce on the next frame
    scene.tick(ms(250));
    assert_eq!(scene.tiles().current_range(), Some(first));
    scene.tick(ms(250));
    let second = scene.tiles().current_range().unwrap();
    assert_ne!(first, second);
    assert!(scene.tiles().pending_retirements() > 0);

    scene.tick(ms(150));
    assert_eq!(scene.tiles().pending_retirements(), 0);
    assert_eq!(scene.tiles().active_cells(), second.cell_count());
}

#[tokio::test]
async fn worker_backed_scene_streams_tiles() {
    let bus = worldmap_scene::EventBus::new();
    let mut scene = WorldScene::new(MapConfig::default(), bus, CullingWorker::spawn()).unwrap();
    scene.tick(ms(250));
    for _ in 0..100 {
        if scene.tiles().active_cells() > 0 {
            break;
        }
        tokio::time::sleep(ms(1)).await;
        scene.tick(Duration::ZERO);
    }
    assert!(scene.tiles().active_cells() > 0);

    let summary = SceneInspector::summary(&scene);
    assert_eq!(summary.active_cells, scene.tiles().active_cells());
    let text = scene.render(&DebugTextRenderer::with_limit(4));
    assert!(text.starts_with("=== Stage"));
}
