//! Configuration module - environment variable parsing and tuning defaults

pub mod presets;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub use presets::{PresetCatalog, PresetError, ProjectilePreset};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Seed for arena generation and damage rolls
    pub match_seed: u64,
    /// Turn, round and match tuning
    pub match_config: MatchConfig,
    /// Physics tuning shared by live flight and preview
    pub physics: PhysicsConfig,
    /// Optional JSON preset catalog on disk
    pub presets_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = MatchConfig::default();

        let match_seed = match env::var("MATCH_SEED") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("MATCH_SEED", raw))?,
            Err(_) => rand::random(),
        };

        let match_config = MatchConfig {
            rounds_to_win: parse_or("ROUNDS_TO_WIN", defaults.rounds_to_win)?,
            turn_secs: parse_or("TURN_SECONDS", defaults.turn_secs)?,
            preparation_secs: parse_or("PREPARATION_SECONDS", defaults.preparation_secs)?,
            flight_timeout_secs: parse_or("FLIGHT_TIMEOUT_SECONDS", defaults.flight_timeout_secs)?,
            round_end_secs: parse_or("ROUND_END_SECONDS", defaults.round_end_secs)?,
            equipped_preset: env::var("EQUIPPED_PRESET")
                .unwrap_or_else(|_| defaults.equipped_preset.clone()),
            ..defaults
        };

        if match_config.rounds_to_win == 0 {
            return Err(ConfigError::Invalid("ROUNDS_TO_WIN", "0".to_string()));
        }

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            match_seed,
            match_config,
            physics: PhysicsConfig::default(),
            presets_path: env::var("PRESETS_PATH").ok().map(PathBuf::from),
        })
    }

    /// Load the preset catalog named by `PRESETS_PATH`, or the built-in one.
    ///
    /// A configured file that cannot be read or parsed is a startup error.
    pub fn load_presets(&self) -> Result<PresetCatalog, ConfigError> {
        match &self.presets_path {
            Some(path) => Ok(PresetCatalog::from_path(path)?),
            None => Ok(PresetCatalog::builtin()),
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key, raw)),
        Err(_) => Ok(default),
    }
}

/// Turn, round and match tuning
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Round wins needed to take the match
    pub rounds_to_win: u32,
    /// Turn timer length
    pub turn_secs: f32,
    /// Countdown before the active player's input unlocks
    pub preparation_secs: f32,
    /// Upper bound on a single volley's flight
    pub flight_timeout_secs: f32,
    /// Pause between a ship's destruction and the next round
    pub round_end_secs: f32,
    /// Moves each ship may make per round
    pub moves_per_round: u32,
    /// Longest single move
    pub max_move_distance: f32,
    /// Camera hold on the impact point after a turn-ending destruction
    pub destruction_delay_secs: f32,
    /// Preset fired by both ships
    pub equipped_preset: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            rounds_to_win: 3,
            turn_secs: 15.0,
            preparation_secs: 3.0,
            flight_timeout_secs: 20.0,
            round_end_secs: 2.0,
            moves_per_round: 2,
            max_move_distance: 6.0,
            destruction_delay_secs: 1.5,
            equipped_preset: "standard".to_string(),
        }
    }
}

/// Physics tuning shared by live flight and preview
#[derive(Clone, Debug)]
pub struct PhysicsConfig {
    /// Gravitational constant `G`
    pub gravitational_constant: f32,
    /// Radius of the playable arena around the origin
    pub arena_radius: f32,
    /// Horizon of the predictive avoidance query (seconds)
    pub lookahead_time: f32,
    /// Added to a body's radius when predicting a collision
    pub avoidance_buffer: f32,
    /// Lateral acceleration at full steering ramp
    pub avoidance_strength: f32,
    /// Pull (acceleration) below which a projectile counts as unbound
    pub lost_pull_threshold: f32,
    /// Distance from arena center beyond which a projectile may be lost
    pub lost_distance_threshold: f32,
    /// How long the lost condition must hold before destruction
    pub lost_delay_secs: f32,
    /// Preview polyline length at full precision
    pub preview_steps: usize,
    /// Outward impulse per unit impact speed on detached parts
    pub detach_impulse_scale: f32,
    /// Random torque bound on detached parts
    pub detach_max_torque: f32,
    /// Exponential decay rate of ship knockback (per second)
    pub knockback_damping: f32,
    /// Fraction of max speed at which high-speed passives engage
    pub high_speed_fraction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: 2.0,
            arena_radius: 60.0,
            lookahead_time: 1.5,
            avoidance_buffer: 1.5,
            avoidance_strength: 25.0,
            lost_pull_threshold: 0.05,
            lost_distance_threshold: 90.0,
            lost_delay_secs: 3.0,
            preview_steps: 120,
            detach_impulse_scale: 0.35,
            detach_max_torque: 6.0,
            knockback_damping: 2.0,
            high_speed_fraction: 0.8,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("Projectile presets unavailable: {0}")]
    Presets(#[from] PresetError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(presets_path: Option<PathBuf>) -> Config {
        Config {
            log_level: "info".to_string(),
            match_seed: 7,
            match_config: MatchConfig::default(),
            physics: PhysicsConfig::default(),
            presets_path,
        }
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        env::remove_var("ORBITAL_DUEL_TEST_UNSET");
        assert_eq!(parse_or("ORBITAL_DUEL_TEST_UNSET", 3u32).unwrap(), 3);
    }

    #[test]
    fn set_variable_is_parsed() {
        env::set_var("ORBITAL_DUEL_TEST_TURN", "12.5");
        assert_eq!(parse_or("ORBITAL_DUEL_TEST_TURN", 15.0f32).unwrap(), 12.5);
    }

    #[test]
    fn unparsable_variable_is_invalid() {
        env::set_var("ORBITAL_DUEL_TEST_BAD", "abc");
        let err = parse_or("ORBITAL_DUEL_TEST_BAD", 3u32).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid("ORBITAL_DUEL_TEST_BAD", ref raw) if raw == "abc"
        ));
    }

    #[test]
    fn zero_rounds_to_win_is_rejected() {
        env::set_var("ROUNDS_TO_WIN", "0");
        let result = Config::from_env();
        env::remove_var("ROUNDS_TO_WIN");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("ROUNDS_TO_WIN", ref raw)) if raw == "0"
        ));
    }

    #[test]
    fn no_preset_path_uses_builtin_catalog() {
        let catalog = config_with(None).load_presets().unwrap();
        assert_eq!(catalog.lookup("twin").volley, 2);
        assert_eq!(catalog.lookup("twin"), PresetCatalog::builtin().lookup("twin"));
    }

    #[test]
    fn unreadable_preset_path_is_a_startup_error() {
        let path = std::env::temp_dir().join("orbital_duel_missing_presets.json");
        let result = config_with(Some(path)).load_presets();
        assert!(matches!(
            result,
            Err(ConfigError::Presets(PresetError::Read { .. }))
        ));
    }
}
