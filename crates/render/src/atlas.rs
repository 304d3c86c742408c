use std::collections::BTreeMap;

/// Draw-order layers. Higher values draw on top.
pub mod depth {
    pub const MAP_BASE: i32 = 100;
    pub const GRASS: i32 = 200;
    pub const ROAD_BASE: i32 = 300;
    pub const ROAD: i32 = 30_001;
    /// Grey overlay on the x = 0 and y = 0 axes.
    pub const AXIS: i32 = 9_999;

    pub const BUILDING_GROUND: i32 = 20_000;
    pub const BUILDING_DECORATION: i32 = 25_000;
    pub const BUILDING_MAIN: i32 = 20_000;
    pub const BUILDING_NAME: i32 = 45_000;
    pub const BUILDING_INFO: i32 = 95_000;

    pub const PLAYER_BASE: i32 = 55_000;
    pub const PLAYER_SHADOW: i32 = 60_000;
    pub const PLAYER_SPRITE: i32 = 65_000;
    pub const PLAYER_TEXT: i32 = 70_000;

    pub const TREE: i32 = 56_000;
    pub const UI_CURSOR: i32 = 95_000;
}

/// Fallback for building textures the atlas does not know.
pub const FALLBACK_BUILDING: &str = "house_base";

const IMAGES: &[&str] = &[
    "grass",
    "ground2",
    "ground3",
    "road2",
    "road3",
    "gray_road",
    "Coconut",
    "house_base",
    "house_rest",
    "market",
    "business_eat",
    "business_learn",
    "business_realEstate",
    "business_relax",
    "business_rest",
    "business_work",
    "government_eat",
    "government_learn",
    "government_realEstate",
    "government_relax",
    "government_rest",
    "government_work",
];

/// Character and vehicle sheets share one frame layout.
const SHEETS: &[&str] = &["p1", "p2", "Bike", "Motorcycle", "Car"];
const SHEET_FRAME: (u32, u32) = (32, 48);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Image,
    /// Spritesheet with fixed frame size in pixels.
    Sheet { frame_width: u32, frame_height: u32 },
}

/// The set of texture keys the scene may reference.
#[derive(Debug, Clone)]
pub struct TextureAtlas {
    textures: BTreeMap<String, TextureKind>,
}

impl Default for TextureAtlas {
    fn default() -> Self {
        let mut textures: BTreeMap<String, TextureKind> = IMAGES
            .iter()
            .map(|k| (k.to_string(), TextureKind::Image))
            .collect();
        for sheet in SHEETS {
            textures.insert(
                sheet.to_string(),
                TextureKind::Sheet {
                    frame_width: SHEET_FRAME.0,
                    frame_height: SHEET_FRAME.1,
                },
            );
        }
        Self { textures }
    }
}

impl TextureAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            textures: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, kind: TextureKind) {
        self.textures.insert(key.to_string(), kind);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn kind(&self, key: &str) -> Option<TextureKind> {
        self.textures.get(key).copied()
    }

    /// `key` if known, otherwise `fallback`.
    pub fn resolve<'a>(&self, key: &'a str, fallback: &'a str) -> &'a str {
        if self.contains(key) {
            key
        } else {
            tracing::debug!(key, fallback, "unknown texture, using fallback");
            fallback
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}
