use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::coords::DEFAULT_CELL_SIZE;

/// Errors from loading a [`MapConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the map scene. Every field has a default, so a config file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Edge length of a grid cell in pixels.
    pub cell_size: f32,
    /// Every `road_modulus`-th row and column is a road.
    pub road_modulus: i32,
    /// Grass overlays sit on cells where both coordinates are multiples of this.
    pub grass_modulus: i32,
    /// Extra cells culled in around the visible area.
    pub cull_buffer: i32,
    /// Probability that an eligible cell hosts a decoration.
    pub decoration_chance: f64,
    /// Mixed into every per-cell decoration seed.
    pub decoration_seed: u64,
    /// Decorations keep at least this many cells away from building entrances.
    pub decoration_exclusion_cells: i32,
    pub retire_delay_ms: u64,
    pub regen_debounce_ms: u64,
    /// Minimum pixel delta before a player counts as moving.
    pub move_threshold: f32,
    pub move_tween_ms: u64,
    pub pan_ms: u64,
    pub pan_zoom: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_button_min: f32,
    /// Zoom and top-left scroll the camera starts with.
    pub initial_zoom: f32,
    pub initial_scroll: [f32; 2],
    /// Viewport size in screen pixels.
    pub viewport: [f32; 2],
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            road_modulus: 4,
            grass_modulus: 3,
            cull_buffer: 2,
            decoration_chance: 0.01,
            decoration_seed: 0,
            decoration_exclusion_cells: 3,
            retire_delay_ms: 100,
            regen_debounce_ms: 200,
            move_threshold: 1.0,
            move_tween_ms: 1750,
            pan_ms: 1000,
            pan_zoom: 0.9,
            zoom_min: 0.2,
            zoom_max: 3.0,
            zoom_button_min: 0.05,
            initial_zoom: 0.5,
            initial_scroll: [-1100.0, -1000.0],
            viewport: [1280.0, 720.0],
        }
    }
}

impl MapConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_size <= 0.0 || !self.cell_size.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.road_modulus <= 0 || self.grass_modulus <= 0 {
            return Err(ConfigError::Invalid(
                "road_modulus and grass_modulus must be positive".into(),
            ));
        }
        if self.cull_buffer < 0 {
            return Err(ConfigError::Invalid("cull_buffer must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.decoration_chance) {
            return Err(ConfigError::Invalid(format!(
                "decoration_chance must be within [0, 1], got {}",
                self.decoration_chance
            )));
        }
        if self.viewport.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(ConfigError::Invalid(format!(
                "viewport {:?} must be positive",
                self.viewport
            )));
        }
        if self.zoom_min <= 0.0 || self.zoom_min > self.zoom_max {
            return Err(ConfigError::Invalid(format!(
                "zoom range [{}, {}] is invalid",
                self.zoom_min, self.zoom_max
            )));
        }
        Ok(())
    }

    pub fn retire_delay(&self) -> Duration {
        Duration::from_millis(self.retire_delay_ms)
    }

    pub fn regen_debounce(&self) -> Duration {
        Duration::from_millis(self.regen_debounce_ms)
    }

    pub fn move_tween(&self) -> Duration {
        Duration::from_millis(self.move_tween_ms)
    }

    pub fn pan_duration(&self) -> Duration {
        Duration::from_millis(self.pan_ms)
    }
}
