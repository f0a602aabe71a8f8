//! Projectile preset catalog
//!
//! Per-projectile physical constants are data, not code: the catalog is
//! either the built-in set below or a JSON file named by `PRESETS_PATH`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Physical and damage constants for one projectile type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectilePreset {
    pub mass: f32,
    /// Multiplicative velocity decay per second
    pub drag: f32,
    pub max_speed: f32,
    /// Lerp factor pulling an over-speed velocity back to `max_speed`
    pub speed_approach_rate: f32,
    pub fuel: f32,
    pub burn_rate: f32,
    /// Base damage
    pub payload: f32,
    /// Damage roll spread, as a fraction of payload
    pub damage_variation: f32,
    pub blast_radius: f32,
    pub self_destruct_factor: f32,
    pub push_strength: f32,
    pub cluster: bool,
    /// Payload scale applied to all three projectiles after a split
    pub cluster_damage_factor: f32,
    pub spread_degrees: f32,
    /// Projectiles per shot
    pub volley: u32,
    /// Angle between neighbouring volley projectiles (degrees)
    pub volley_spread_degrees: f32,
    /// Launch input speed at full power (halved by the launch routine)
    pub launch_power_scale: f32,
    pub contact_radius: f32,
}

impl Default for ProjectilePreset {
    fn default() -> Self {
        Self {
            mass: 1.0,
            drag: 0.02,
            max_speed: 40.0,
            speed_approach_rate: 0.1,
            fuel: 10.0,
            burn_rate: 1.0,
            payload: 25.0,
            damage_variation: 0.15,
            blast_radius: 8.0,
            self_destruct_factor: 0.6,
            push_strength: 12.0,
            cluster: false,
            cluster_damage_factor: 0.5,
            spread_degrees: 15.0,
            volley: 1,
            volley_spread_degrees: 4.0,
            launch_power_scale: 60.0,
            contact_radius: 0.5,
        }
    }
}

/// Named projectile presets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetCatalog {
    presets: HashMap<String, ProjectilePreset>,
}

impl PresetCatalog {
    /// The presets shipped with the game
    pub fn builtin() -> Self {
        let mut presets = HashMap::new();
        presets.insert("standard".to_string(), ProjectilePreset::default());
        presets.insert(
            "heavy".to_string(),
            ProjectilePreset {
                mass: 3.0,
                drag: 0.01,
                max_speed: 32.0,
                fuel: 8.0,
                payload: 40.0,
                damage_variation: 0.1,
                blast_radius: 10.0,
                push_strength: 18.0,
                ..ProjectilePreset::default()
            },
        );
        presets.insert(
            "cluster".to_string(),
            ProjectilePreset {
                payload: 30.0,
                cluster: true,
                cluster_damage_factor: 0.5,
                spread_degrees: 12.0,
                ..ProjectilePreset::default()
            },
        );
        presets.insert(
            "twin".to_string(),
            ProjectilePreset {
                payload: 16.0,
                volley: 2,
                ..ProjectilePreset::default()
            },
        );
        Self { presets }
    }

    /// Parse a catalog from JSON (`{"presets": {"name": {...}}}`)
    pub fn from_json(raw: &str) -> Result<Self, PresetError> {
        let catalog: Self = serde_json::from_str(raw)?;
        if catalog.presets.is_empty() {
            return Err(PresetError::Empty);
        }
        Ok(catalog)
    }

    /// Read and parse a catalog file
    pub fn from_path(path: &Path) -> Result<Self, PresetError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PresetError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Look up a preset, falling back to built-in constants when it is missing
    pub fn lookup(&self, name: &str) -> ProjectilePreset {
        match self.presets.get(name) {
            Some(preset) => preset.clone(),
            None => {
                warn!(preset = name, "Projectile preset not found, using defaults");
                ProjectilePreset::default()
            }
        }
    }
}

/// Preset catalog errors
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Failed to read preset file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse preset catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Preset catalog contains no presets")]
    Empty,
}
