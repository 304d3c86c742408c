use worldmap_kernel::{Item, PlayerState};

use super::animation::AnimationSet;

/// What a player is wearing, as far as the map cares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loadout {
    pub vehicle: Option<Item>,
    /// Stored for info panels; not drawn.
    pub weapon: Option<Item>,
    pub armor: Option<Item>,
}

impl Loadout {
    pub fn animation_set(&self) -> AnimationSet {
        self.vehicle
            .as_ref()
            .and_then(|v| AnimationSet::from_vehicle(&v.name))
            .unwrap_or_default()
    }

    /// Rebuild from the player's equipped map, vehicle slot first.
    ///
    /// Returns the new animation set if it differs from the previous one.
    pub fn reconcile(&mut self, player: &PlayerState) -> Option<AnimationSet> {
        let before = self.animation_set();

        self.vehicle = match player.equipped_items.get("vehicle").and_then(|s| s.worn()) {
            Some(item) if AnimationSet::from_vehicle(&item.name).is_some() => Some(item.clone()),
            Some(item) => {
                tracing::warn!(player = %player.id, vehicle = %item.name, "unknown vehicle ignored");
                None
            }
            None => None,
        };
        self.weapon = None;
        self.armor = None;
        for (slot, equip) in &player.equipped_items {
            let Some(item) = equip.worn() else { continue };
            match slot.as_str() {
                "vehicle" => {}
                "weapon" => self.weapon = Some(item.clone()),
                "armor" => self.armor = Some(item.clone()),
                other => tracing::warn!(player = %player.id, slot = other, "unknown equipment slot"),
            }
        }

        let after = self.animation_set();
        (after != before).then_some(after)
    }
}
