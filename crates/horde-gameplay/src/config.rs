//! Behavior engine configuration.
//!
//! Provides the tunable distances, probabilities, and time units the monster
//! behavior engine runs with. Configuration can be loaded from and saved to a
//! TOML file; missing or malformed files fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Behavior engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    // === Ranges (cells) ===
    /// Distance within which an aggressive monster spontaneously targets a character
    pub aggro_radius: u32,
    /// Maximum distance a monster keeps chasing before it gives up and returns home
    pub chase_distance: u32,

    // === Combat ===
    /// Chance (percent) per tick that a monster in combat rolls for a skill
    pub skill_roll_percent: u32,
    /// Size of one basic-attack cooldown unit in milliseconds
    pub basic_cooldown_unit_ms: u64,
    /// Size of one skill cooldown unit in milliseconds
    pub skill_cooldown_unit_ms: u64,
    /// Size of one cast-time unit in milliseconds
    pub cast_time_unit_ms: u64,
    /// Delay between forcing a seated target up and the hit landing
    pub stand_up_delay_ms: u64,
    /// Delay between a character dying and the revival prompt
    pub revival_prompt_delay_ms: u64,

    // === Lifecycle ===
    /// Size of one respawn-time unit in milliseconds
    pub respawn_unit_ms: u64,

    // === Movement ===
    /// Upper bound on the announced travel time of one chase step
    pub max_chase_step_ms: u64,
    /// Lower bound (inclusive) of the randomized idle-move delay
    pub idle_move_min_ms: u64,
    /// Upper bound (exclusive) of the randomized idle-move delay
    pub idle_move_max_ms: u64,
    /// Lower bound (inclusive) of the idle-move delay rolled at spawn
    pub initial_idle_move_min_ms: u64,
    /// Upper bound (exclusive) of the idle-move delay rolled at spawn
    pub initial_idle_move_max_ms: u64,
    /// Lower bound (inclusive) of the combined wander spread
    pub wander_spread_min: u8,
    /// Upper bound (exclusive) of the combined wander spread
    pub wander_spread_max: u8,

    // === Effects ===
    /// Effect shown to a character when a monster aggroes on it
    pub aggro_effect: u16,
    /// Effect shown to the map when a monster respawns
    pub respawn_effect: u16,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            // Ranges
            aggro_radius: 10,
            chase_distance: 22,

            // Combat
            skill_roll_percent: 10,
            basic_cooldown_unit_ms: 200,
            skill_cooldown_unit_ms: 100,
            cast_time_unit_ms: 100,
            stand_up_delay_ms: 500,
            revival_prompt_delay_ms: 1000,

            // Lifecycle
            respawn_unit_ms: 100,

            // Movement
            max_chase_step_ms: 1000,
            idle_move_min_ms: 500,
            idle_move_max_ms: 3000,
            initial_idle_move_min_ms: 300,
            initial_idle_move_max_ms: 3000,
            wander_spread_min: 2,
            wander_spread_max: 4,

            // Effects
            aggro_effect: 5000,
            respawn_effect: 7,
        }
    }
}

impl BehaviorConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Behavior config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read behavior config: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(config) => {
                        info!("Loaded behavior config from {}", path.display());
                        config.validated()
                    },
                    Err(e) => {
                        warn!("Failed to parse behavior config: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open behavior config: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved behavior config to {}", path.display());
        Ok(())
    }

    /// Repairs ranges that would make random rolls panic.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.skill_roll_percent = self.skill_roll_percent.min(100);
        if self.idle_move_max_ms <= self.idle_move_min_ms {
            warn!("idle_move_max_ms must exceed idle_move_min_ms, widening range");
            self.idle_move_max_ms = self.idle_move_min_ms + 1;
        }
        if self.initial_idle_move_max_ms <= self.initial_idle_move_min_ms {
            self.initial_idle_move_max_ms = self.initial_idle_move_min_ms + 1;
        }
        if self.wander_spread_min < 1 {
            self.wander_spread_min = 1;
        }
        if self.wander_spread_max <= self.wander_spread_min {
            self.wander_spread_max = self.wander_spread_min + 1;
        }
        self
    }

    /// Basic-attack cooldown for a template value expressed in cooldown units.
    #[must_use]
    pub fn basic_cooldown(&self, units: u16) -> Duration {
        Duration::from_millis(u64::from(units) * self.basic_cooldown_unit_ms)
    }

    /// Skill cooldown for a template value expressed in cooldown units.
    #[must_use]
    pub fn skill_cooldown(&self, units: u16) -> Duration {
        Duration::from_millis(u64::from(units) * self.skill_cooldown_unit_ms)
    }

    /// Cast time for a template value expressed in cast-time units.
    #[must_use]
    pub fn cast_time(&self, units: u16) -> Duration {
        Duration::from_millis(u64::from(units) * self.cast_time_unit_ms)
    }

    /// Respawn delay for a template value expressed in respawn units.
    #[must_use]
    pub fn respawn_delay(&self, units: u32) -> Duration {
        Duration::from_millis(u64::from(units) * self.respawn_unit_ms)
    }

    /// Delay between forcing a seated target up and the hit landing.
    #[must_use]
    pub fn stand_up_delay(&self) -> Duration {
        Duration::from_millis(self.stand_up_delay_ms)
    }

    /// Delay between a character dying and its revival prompt.
    #[must_use]
    pub fn revival_prompt_delay(&self) -> Duration {
        Duration::from_millis(self.revival_prompt_delay_ms)
    }
}
