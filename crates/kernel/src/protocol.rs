use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use worldmap_common::{BuildingId, CellCoord, ItemId, PlayerId, deserialize_optional_building};
use worldmap_ecs::EntityRecord;

/// Errors from decoding a transport frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{0}` event carries no data")]
    MissingData(String),
    #[error("`{kind}` event has unexpected payload shape: {detail}")]
    UnexpectedShape { kind: String, detail: String },
}

/// One equipped-item slot as sent by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipSlot {
    #[serde(rename = "isEquipped", default)]
    pub is_equipped: bool,
    #[serde(default)]
    pub item: Option<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
}

impl EquipSlot {
    /// The item in this slot, if it is actually worn and named.
    pub fn worn(&self) -> Option<&Item> {
        self.item
            .as_ref()
            .filter(|item| self.is_equipped && !item.name.is_empty())
    }
}

/// A player record. Fields the renderer does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(rename = "playerID")]
    pub id: PlayerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "locationX")]
    pub x: f32,
    #[serde(rename = "locationY")]
    pub y: f32,
    /// Server-side activity label (`idle`, `walking`, ...).
    #[serde(rename = "state", default = "default_activity", deserialize_with = "deserialize_activity")]
    pub activity: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(
        rename = "buildingID",
        default,
        deserialize_with = "deserialize_optional_building"
    )]
    pub building_id: Option<BuildingId>,
    #[serde(rename = "equippedItems", default)]
    pub equipped_items: BTreeMap<String, EquipSlot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerState {
    /// Minimal record, mostly useful for tests and tools.
    pub fn new(id: impl Into<PlayerId>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            name: None,
            x,
            y,
            activity: default_activity(),
            balance: 0.0,
            building_id: None,
            equipped_items: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unknown Player")
    }

    /// Slot -> item id for every worn item; the comparable view of the equipment map.
    pub fn equipment_ids(&self) -> BTreeMap<&str, &ItemId> {
        self.equipped_items
            .iter()
            .filter_map(|(slot, equip)| equip.worn().map(|item| (slot.as_str(), &item.id)))
            .collect()
    }
}

fn default_activity() -> String {
    "idle".to_string()
}

/// `state` arrives either as a plain string or as `{ "state": "..." }`.
fn deserialize_activity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Activity {
        Plain(String),
        Nested { state: Option<String> },
        Other(Value),
    }

    Ok(match Option::<Activity>::deserialize(deserializer)? {
        Some(Activity::Plain(s)) if !s.is_empty() => s,
        Some(Activity::Nested { state: Some(s) }) if !s.is_empty() => s,
        _ => default_activity(),
    })
}

/// A building record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingState {
    pub id: BuildingId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// `None` when the record carries no usable entrance; such buildings are not placed.
    #[serde(default, deserialize_with = "deserialize_entrance")]
    pub entrance: Option<CellCoord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildingState {
    pub fn new(id: impl Into<BuildingId>, name: &str, kind: &str, entrance: CellCoord) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            kind: kind.to_string(),
            capabilities: Vec::new(),
            entrance: Some(entrance),
            extra: Map::new(),
        }
    }

    pub fn primary_capability(&self) -> Option<&str> {
        self.capabilities.first().map(String::as_str)
    }
}

impl EntityRecord for PlayerState {
    type Id = PlayerId;

    fn id(&self) -> &PlayerId {
        &self.id
    }
}

impl EntityRecord for BuildingState {
    type Id = BuildingId;

    fn id(&self) -> &BuildingId {
        &self.id
    }

    /// Buildings without an entrance cannot be placed.
    fn is_valid(&self) -> bool {
        self.entrance.is_some()
    }
}

/// Accepts `{ "x": n, "y": n }` with integral numbers; anything else yields `None`
/// so a bad entrance does not take the rest of the record down with it.
fn deserialize_entrance<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<CellCoord>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let coord = |v: &Value, key: &str| -> Option<i32> {
        let n = v.get(key)?.as_f64()?;
        (n.is_finite() && n.fract() == 0.0).then_some(n as i32)
    };
    Ok(value.and_then(|v| Some(CellCoord::new(coord(&v, "x")?, coord(&v, "y")?))))
}

/// A decoded transport frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Player roster. `partial` is set when the frame carried a single record
    /// instead of the whole roster.
    ///
    /// `held` lists ids whose record failed to decode; they are still present
    /// on the server and keep their last known state.
    Players {
        players: Vec<PlayerState>,
        held: Vec<PlayerId>,
        partial: bool,
        rejected: usize,
    },
    Buildings {
        buildings: Vec<BuildingState>,
        held: Vec<BuildingId>,
        rejected: usize,
    },
    Chat(Value),
    TickEnd,
    /// Anything else, forwarded without interpretation.
    Other { kind: String, data: Value },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl InboundEvent {
    /// Decode a raw text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Envelope { kind, data } = serde_json::from_value(value)?;
        match kind.as_str() {
            "players" => match data {
                Value::Array(items) => {
                    let decoded = decode_records(&kind, "playerID", items);
                    Ok(Self::Players {
                        players: decoded.records,
                        held: decoded.held,
                        partial: false,
                        rejected: decoded.rejected,
                    })
                }
                Value::Object(_) => {
                    let decoded = decode_records(&kind, "playerID", vec![data]);
                    Ok(Self::Players {
                        players: decoded.records,
                        held: decoded.held,
                        partial: true,
                        rejected: decoded.rejected,
                    })
                }
                Value::Null => Err(ProtocolError::MissingData(kind)),
                other => Err(ProtocolError::UnexpectedShape {
                    kind,
                    detail: format!("expected array or object, got {}", value_kind(&other)),
                }),
            },
            // `map` is the older name for the building roster.
            "buildings" | "map" => {
                let items = building_items(&kind, data)?;
                let decoded = decode_records(&kind, "id", items);
                Ok(Self::Buildings {
                    buildings: decoded.records,
                    held: decoded.held,
                    rejected: decoded.rejected,
                })
            }
            "chat" => Ok(Self::Chat(data)),
            "tickEnd" => Ok(Self::TickEnd),
            _ => Ok(Self::Other { kind, data }),
        }
    }

    /// Message type used for burst collapsing and logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Players { .. } => "players",
            Self::Buildings { .. } => "buildings",
            Self::Chat(_) => "chat",
            Self::TickEnd => "tickEnd",
            Self::Other { kind, .. } => kind,
        }
    }
}

/// Unwrap `[...]`, `{ buildings: [...] }` and `{ data: { buildings: [...] } }`.
fn building_items(kind: &str, data: Value) -> Result<Vec<Value>, ProtocolError> {
    match data {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("buildings") {
                return Ok(items);
            }
            match map.remove("data") {
                Some(inner) => building_items(kind, inner),
                None => Err(ProtocolError::UnexpectedShape {
                    kind: kind.to_string(),
                    detail: "object without `buildings`".into(),
                }),
            }
        }
        Value::Null => Err(ProtocolError::MissingData(kind.to_string())),
        other => Err(ProtocolError::UnexpectedShape {
            kind: kind.to_string(),
            detail: format!("expected array or object, got {}", value_kind(&other)),
        }),
    }
}

struct Decoded<T, I> {
    records: Vec<T>,
    held: Vec<I>,
    rejected: usize,
}

/// Decode each record on its own. A corrupt record is logged and dropped,
/// but its id is kept in `held` when `id_key` still parses.
fn decode_records<T, I>(kind: &str, id_key: &str, items: Vec<Value>) -> Decoded<T, I>
where
    T: DeserializeOwned,
    I: DeserializeOwned,
{
    let mut decoded = Decoded {
        records: Vec::with_capacity(items.len()),
        held: Vec::new(),
        rejected: 0,
    };
    for (index, item) in items.into_iter().enumerate() {
        let id = item.get(id_key).and_then(|v| I::deserialize(v).ok());
        match serde_json::from_value(item) {
            Ok(record) => decoded.records.push(record),
            Err(err) => {
                decoded.rejected += 1;
                tracing::warn!(kind, index, %err, "skipping malformed record");
                decoded.held.extend(id);
            }
        }
    }
    decoded
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
