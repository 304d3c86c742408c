use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier as it arrives on the wire: the transport sends either numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawId {
    fn into_key(self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            // Whole floats (e.g. `42.0`) name the same entity as the integer.
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => (v as i64).to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

macro_rules! wire_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v.to_string())
            }
        }

        impl From<&str> for $name {
            fn from(v: &str) -> Self {
                Self(v.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let key = RawId::deserialize(deserializer)?.into_key();
                if key.is_empty() {
                    return Err(serde::de::Error::custom(concat!(
                        stringify!($name),
                        " must not be empty"
                    )));
                }
                Ok(Self(key))
            }
        }
    };
}

wire_id!(
    /// Stable identifier of a player.
    PlayerId
);

wire_id!(
    /// Stable identifier of a building.
    BuildingId
);

wire_id!(
    /// Identifier of an equippable item.
    ItemId
);

/// Deserialize a nullable building reference. `null`, missing and `""` all mean "outside".
pub fn deserialize_optional_building<'de, D>(deserializer: D) -> Result<Option<BuildingId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawId> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(RawId::into_key)
        .filter(|key| !key.is_empty())
        .map(BuildingId))
}

/// A cell coordinate in the integer world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance in cells.
    pub fn distance_sq(self, other: CellCoord) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

/// Inclusive rectangular range of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start_x: i32,
    pub end_x: i32,
    pub start_y: i32,
    pub end_y: i32,
}

impl CellRange {
    pub fn new(start_x: i32, end_x: i32, start_y: i32, end_y: i32) -> Self {
        Self {
            start_x,
            end_x,
            start_y,
            end_y,
        }
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= self.start_x && cell.x <= self.end_x && cell.y >= self.start_y && cell.y <= self.end_y
    }

    pub fn is_empty(&self) -> bool {
        self.end_x < self.start_x || self.end_y < self.start_y
    }

    pub fn cell_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let w = (self.end_x as i64 - self.start_x as i64 + 1) as usize;
        let h = (self.end_y as i64 - self.start_y as i64 + 1) as usize;
        w.saturating_mul(h)
    }

    /// All cells in the range, column-major (x outer, y inner).
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + use<> {
        let (sy, ey) = (self.start_y, self.end_y);
        (self.start_x..=self.end_x).flat_map(move |x| (sy..=ey).map(move |y| CellCoord::new(x, y)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x=[{}..={}] y=[{}..={}]",
            self.start_x, self.end_x, self.start_y, self.end_y
        )
    }
}
