use std::collections::BTreeMap;
use worldmap_common::{BuildingId, PlayerId};

use crate::protocol::{BuildingState, PlayerState};

/// A player moved between buildings (or between a building and the street).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyChange {
    pub player: PlayerId,
    pub from: Option<BuildingId>,
    pub to: Option<BuildingId>,
}

impl OccupancyChange {
    /// Buildings whose occupant list is affected by this change.
    pub fn touched(&self) -> impl Iterator<Item = &BuildingId> {
        self.from.iter().chain(self.to.iter())
    }
}

/// Latest known server records for players and buildings.
///
/// The roster is the single place occupancy is derived from; buildings never
/// store their occupants. BTreeMap keeps iteration (and therefore overlay
/// text and event payloads) deterministic.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: BTreeMap<PlayerId, PlayerState>,
    buildings: BTreeMap<BuildingId, BuildingState>,
    player_snapshots: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a player snapshot and return every occupancy transition it causes.
    ///
    /// A full snapshot replaces the roster; players missing from it leave
    /// whatever building they were in. A partial snapshot only upserts.
    pub fn apply_players(&mut self, players: &[PlayerState], partial: bool) -> Vec<OccupancyChange> {
        let mut changes = Vec::new();
        let mut incoming: BTreeMap<PlayerId, &PlayerState> = BTreeMap::new();
        for p in players {
            incoming.insert(p.id.clone(), p);
        }

        if !partial {
            let gone: Vec<PlayerId> = self
                .players
                .keys()
                .filter(|id| !incoming.contains_key(*id))
                .cloned()
                .collect();
            for id in gone {
                let Some(old) = self.players.remove(&id) else {
                    continue;
                };
                if old.building_id.is_some() {
                    changes.push(OccupancyChange {
                        player: id,
                        from: old.building_id,
                        to: None,
                    });
                }
            }
        }

        for (id, record) in incoming {
            let from = self.players.get(&id).and_then(|p| p.building_id.clone());
            if from != record.building_id {
                changes.push(OccupancyChange {
                    player: id.clone(),
                    from,
                    to: record.building_id.clone(),
                });
            }
            self.players.insert(id, record.clone());
        }

        self.player_snapshots += 1;
        changes
    }

    /// Replace the building roster. Buildings are always sent whole.
    pub fn apply_buildings(&mut self, buildings: &[BuildingState]) {
        self.buildings = buildings
            .iter()
            .map(|b| (b.id.clone(), b.clone()))
            .collect();
    }

    /// Number of player snapshots applied so far.
    pub fn player_snapshots(&self) -> u64 {
        self.player_snapshots
    }

    pub fn player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn building(&self, id: &BuildingId) -> Option<&BuildingState> {
        self.buildings.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingState> {
        self.buildings.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Players currently inside `building`, ordered by id.
    pub fn occupants_of(&self, building: &BuildingId) -> Vec<&PlayerState> {
        self.players
            .values()
            .filter(|p| p.building_id.as_ref() == Some(building))
            .collect()
    }

    /// Every building with at least one occupant, with its occupants' ids.
    pub fn occupied_buildings(&self) -> BTreeMap<BuildingId, Vec<PlayerId>> {
        let mut out: BTreeMap<BuildingId, Vec<PlayerId>> = BTreeMap::new();
        for p in self.players.values() {
            if let Some(b) = &p.building_id {
                out.entry(b.clone()).or_default().push(p.id.clone());
            }
        }
        out
    }

    /// Full roster as cloned records, the payload of world-state broadcasts.
    pub fn snapshot_players(&self) -> Vec<PlayerState> {
        self.players.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldmap_common::CellCoord;

    fn inside(id: u64, building: Option<u64>) -> PlayerState {
        let mut p = PlayerState::new(id, 0.0, 0.0);
        p.building_id = building.map(BuildingId::from);
        p
    }

    #[test]
    fn entering_a_building_is_reported() {
        let mut roster = Roster::new();
        assert!(roster.apply_players(&[inside(42, None)], false).is_empty());

        let changes = roster.apply_players(&[inside(42, Some(17))], false);
        assert_eq!(
            changes,
            vec![OccupancyChange {
                player: PlayerId::from(42u64),
                from: None,
                to: Some(BuildingId::from(17u64)),
            }]
        );
        let occupants = roster.occupants_of(&BuildingId::from(17u64));
        assert_eq!(occupants.len(), 1);
        assert_eq!(occupants[0].id, PlayerId::from(42u64));
    }

    #[test]
    fn new_player_already_inside_counts_as_transition() {
        let mut roster = Roster::new();
        let changes = roster.apply_players(&[inside(1, Some(3))], false);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, None);
    }

    #[test]
    fn full_snapshot_removes_missing_players() {
        let mut roster = Roster::new();
        roster.apply_players(&[inside(1, Some(3)), inside(2, None)], false);
        let changes = roster.apply_players(&[inside(2, None)], false);
        assert_eq!(roster.player_count(), 1);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].player, PlayerId::from(1u64));
        assert_eq!(changes[0].to, None);
        assert!(roster.occupied_buildings().is_empty());
    }

    #[test]
    fn partial_snapshot_only_upserts() {
        let mut roster = Roster::new();
        roster.apply_players(&[inside(1, None), inside(2, None)], false);
        roster.apply_players(&[inside(3, Some(9))], true);
        assert_eq!(roster.player_count(), 3);
        assert_eq!(roster.player_snapshots(), 2);
        assert_eq!(
            roster.occupied_buildings()[&BuildingId::from(9u64)],
            vec![PlayerId::from(3u64)]
        );
    }

    #[test]
    fn buildings_are_replaced_whole() {
        let mut roster = Roster::new();
        roster.apply_buildings(&[
            BuildingState::new(1u64, "A", "house", CellCoord::new(0, 0)),
            BuildingState::new(2u64, "B", "house", CellCoord::new(4, 4)),
        ]);
        roster.apply_buildings(&[BuildingState::new(2u64, "B2", "house", CellCoord::new(4, 4))]);
        assert_eq!(roster.building_count(), 1);
        assert_eq!(roster.building(&BuildingId::from(2u64)).unwrap().name, "B2");
    }
}
