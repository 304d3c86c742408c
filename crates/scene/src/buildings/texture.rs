use worldmap_kernel::BuildingState;
use worldmap_render::{FALLBACK_BUILDING, TextureAtlas};

/// Atlas key for the house sprite of `building`.
///
/// Government buildings named "Market" use the market sprite and houses the
/// rest sprite; everything else is `{type}_{primary capability}`. Keys the
/// atlas does not know fall back to the base house.
pub fn house_texture(building: &BuildingState, atlas: &TextureAtlas) -> String {
    let key = if building.kind == "government" && building.name == "Market" {
        "market".to_string()
    } else if building.kind == "house" {
        "house_rest".to_string()
    } else {
        match building.primary_capability() {
            Some(cap) if !cap.is_empty() => format!("{}_{}", building.kind, cap),
            _ => FALLBACK_BUILDING.to_string(),
        }
    };
    atlas.resolve(&key, FALLBACK_BUILDING).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldmap_common::CellCoord;

    fn building(kind: &str, name: &str, caps: &[&str]) -> BuildingState {
        let mut b = BuildingState::new(1u64, name, kind, CellCoord::new(0, 0));
        b.capabilities = caps.iter().map(|c| c.to_string()).collect();
        b
    }

    #[test]
    fn special_cases_win() {
        let atlas = TextureAtlas::new();
        assert_eq!(house_texture(&building("government", "Market", &["eat"]), &atlas), "market");
        assert_eq!(house_texture(&building("house", "Home", &["work"]), &atlas), "house_rest");
    }

    #[test]
    fn type_and_capability_compose() {
        let atlas = TextureAtlas::new();
        assert_eq!(
            house_texture(&building("business", "Diner", &["eat", "relax"]), &atlas),
            "business_eat"
        );
        assert_eq!(
            house_texture(&building("government", "School", &["learn"]), &atlas),
            "government_learn"
        );
    }

    #[test]
    fn empty_or_unknown_falls_back() {
        let atlas = TextureAtlas::new();
        assert_eq!(house_texture(&building("business", "Lot", &[""]), &atlas), "house_base");
        assert_eq!(house_texture(&building("business", "Lot", &[]), &atlas), "house_base");
        assert_eq!(house_texture(&building("spaceport", "X", &["fly"]), &atlas), "house_base");
    }
}
