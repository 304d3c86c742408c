use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use worldmap_common::CellCoord;

/// splitmix64 finalizer; spreads neighbouring cells over the seed space.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for one cell. Depends only on the world seed and the coordinates.
pub fn cell_seed(world_seed: u64, cell: CellCoord) -> u64 {
    let packed = ((cell.x as u32 as u64) << 32) | cell.y as u32 as u64;
    mix(world_seed ^ mix(packed))
}

/// Decides which cells host a decoration. The outcome for a cell never
/// depends on which other cells were visited before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecorationRule {
    pub seed: u64,
    pub chance: f64,
}

impl DecorationRule {
    pub fn new(seed: u64, chance: f64) -> Self {
        Self { seed, chance }
    }

    pub fn places(&self, cell: CellCoord) -> bool {
        let mut rng = ChaCha8Rng::seed_from_u64(cell_seed(self.seed, cell));
        rng.gen_bool(self.chance.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extremes() {
        let never = DecorationRule::new(1, 0.0);
        let always = DecorationRule::new(1, 1.0);
        for x in -20..20 {
            let c = CellCoord::new(x, x * 3);
            assert!(!never.places(c));
            assert!(always.places(c));
        }
    }

    #[test]
    fn density_is_roughly_the_chance() {
        let rule = DecorationRule::new(42, 0.1);
        let hits = (0..100)
            .flat_map(|x| (0..100).map(move |y| CellCoord::new(x, y)))
            .filter(|c| rule.places(*c))
            .count();
        assert!((700..1300).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn world_seed_changes_layout() {
        let a = DecorationRule::new(1, 0.5);
        let b = DecorationRule::new(2, 0.5);
        let differs = (0..64)
            .map(|x| CellCoord::new(x, 0))
            .any(|c| a.places(c) != b.places(c));
        assert!(differs);
    }

    proptest! {
        #[test]
        fn same_cell_same_outcome(seed in any::<u64>(), x in any::<i32>(), y in any::<i32>()) {
            let rule = DecorationRule::new(seed, 0.3);
            let cell = CellCoord::new(x, y);
            prop_assert_eq!(rule.places(cell), rule.places(cell));
        }
    }
}
