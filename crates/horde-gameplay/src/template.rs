//! Monster species templates and the species catalog.
//!
//! This module provides:
//! - Immutable per-species data (vitals, speed, ranges, cooldowns, skills)
//! - Loading species from TOML files (`[[species]]` with nested `[[species.skills]]`)
//! - Validation on load and duplicate rejection
//!
//! Durations are stored in the catalog's native units and converted through
//! [`BehaviorConfig`]: skill cooldowns and cast times in deciseconds, respawn
//! times in deciseconds, basic-attack cooldowns in 200 ms units.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use horde_common::{SkillId, SpeciesId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BehaviorConfig;

/// Errors that can occur while building the species catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read file.
    #[error("Failed to read species file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse species TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error.
    #[error("Species validation error: {0}")]
    ValidationError(String),

    /// Duplicate species ID.
    #[error("Duplicate species ID: {0}")]
    DuplicateId(SpeciesId),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<CatalogError> for horde_common::HordeError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::ReadError(io) => Self::Io(io),
            other => Self::Config(other.to_string()),
        }
    }
}

/// A skill a species can cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTemplate {
    /// Skill identifier
    pub skill: SkillId,
    /// Cooldown in skill cooldown units (deciseconds)
    #[serde(default)]
    pub cooldown: u16,
    /// Cast time in cast-time units (deciseconds)
    #[serde(default)]
    pub cast_time: u16,
    /// Animation played when the cast starts
    #[serde(default)]
    pub cast_animation: u16,
    /// Effect shown while casting (0 = none, no cast delay)
    #[serde(default)]
    pub cast_effect: u16,
    /// Animation played when the hit lands
    #[serde(default)]
    pub attack_animation: u16,
    /// Effect shown when the hit lands
    #[serde(default)]
    pub effect: u16,
    /// Reach of the skill in cells
    #[serde(default)]
    pub range: u8,
    /// Radius of the splash around the impact point
    #[serde(default)]
    pub target_range: u8,
    /// Mana consumed per cast
    #[serde(default)]
    pub mp_cost: u32,
}

impl SkillTemplate {
    /// Creates a new skill with no cost, cooldown, or reach.
    #[must_use]
    pub const fn new(skill: SkillId) -> Self {
        Self {
            skill,
            cooldown: 0,
            cast_time: 0,
            cast_animation: 0,
            cast_effect: 0,
            attack_animation: 0,
            effect: 0,
            range: 0,
            target_range: 0,
            mp_cost: 0,
        }
    }

    /// Sets the cooldown (deciseconds).
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: u16) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the cast effect and cast time (deciseconds).
    #[must_use]
    pub const fn with_cast(mut self, cast_effect: u16, cast_time: u16) -> Self {
        self.cast_effect = cast_effect;
        self.cast_time = cast_time;
        self
    }

    /// Sets the reach and splash radius.
    #[must_use]
    pub const fn with_range(mut self, range: u8, target_range: u8) -> Self {
        self.range = range;
        self.target_range = target_range;
        self
    }

    /// Sets the mana cost.
    #[must_use]
    pub const fn with_mp_cost(mut self, mp_cost: u32) -> Self {
        self.mp_cost = mp_cost;
        self
    }

    /// Returns true if hits from this skill splash onto nearby characters.
    #[must_use]
    pub const fn has_area(&self) -> bool {
        self.range > 0 || self.target_range > 0
    }

    /// Cooldown as a duration.
    #[must_use]
    pub fn cooldown_duration(&self, config: &BehaviorConfig) -> Duration {
        config.skill_cooldown(self.cooldown)
    }

    /// Cast time as a duration.
    #[must_use]
    pub fn cast_duration(&self, config: &BehaviorConfig) -> Duration {
        config.cast_time(self.cast_time)
    }
}

const fn default_respawns() -> bool {
    true
}

const fn default_basic_range() -> u8 {
    1
}

/// Immutable data shared by every instance of a species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    /// Species identifier
    pub species: SpeciesId,
    /// Display name
    pub name: String,
    /// Maximum health
    pub max_hp: u32,
    /// Maximum mana
    #[serde(default)]
    pub max_mp: u32,
    /// Movement speed; 0 never moves
    #[serde(default)]
    pub speed: u8,
    /// Whether the species attacks characters on sight
    #[serde(default)]
    pub aggressive: bool,
    /// Suppresses the aggression cue sent to the target
    #[serde(default)]
    pub hide_aggro_icon: bool,
    /// Whether dead instances come back
    #[serde(default = "default_respawns")]
    pub respawns: bool,
    /// Delay before a dead instance respawns (deciseconds)
    #[serde(default)]
    pub respawn_time: u32,
    /// Reach of the basic attack in cells
    #[serde(default = "default_basic_range")]
    pub basic_range: u8,
    /// Basic-attack cooldown in basic cooldown units (200 ms)
    #[serde(default)]
    pub basic_cooldown: u16,
    /// Effect shown when a basic attack lands
    #[serde(default)]
    pub basic_skill: u16,
    /// Castable skills
    #[serde(default)]
    pub skills: Vec<SkillTemplate>,
}

impl MonsterTemplate {
    /// Creates a new template with full defaults and the given vitals.
    #[must_use]
    pub fn new(species: SpeciesId, name: impl Into<String>, max_hp: u32) -> Self {
        Self {
            species,
            name: name.into(),
            max_hp,
            max_mp: 0,
            speed: 0,
            aggressive: false,
            hide_aggro_icon: false,
            respawns: true,
            respawn_time: 0,
            basic_range: default_basic_range(),
            basic_cooldown: 0,
            basic_skill: 0,
            skills: Vec::new(),
        }
    }

    /// Sets maximum mana.
    #[must_use]
    pub fn with_max_mp(mut self, max_mp: u32) -> Self {
        self.max_mp = max_mp;
        self
    }

    /// Sets movement speed.
    #[must_use]
    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }

    /// Marks the species as aggressive.
    #[must_use]
    pub fn with_aggressive(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }

    /// Sets respawn behaviour (deciseconds).
    #[must_use]
    pub fn with_respawn(mut self, respawns: bool, respawn_time: u32) -> Self {
        self.respawns = respawns;
        self.respawn_time = respawn_time;
        self
    }

    /// Sets the basic attack.
    #[must_use]
    pub fn with_basic_attack(mut self, range: u8, cooldown: u16, skill_effect: u16) -> Self {
        self.basic_range = range;
        self.basic_cooldown = cooldown;
        self.basic_skill = skill_effect;
        self
    }

    /// Adds a castable skill.
    #[must_use]
    pub fn with_skill(mut self, skill: SkillTemplate) -> Self {
        self.skills.push(skill);
        self
    }

    /// Returns true if instances of this species can ever move.
    #[must_use]
    pub const fn can_move(&self) -> bool {
        self.speed > 0
    }

    /// Basic-attack cooldown as a duration.
    #[must_use]
    pub fn basic_cooldown_duration(&self, config: &BehaviorConfig) -> Duration {
        config.basic_cooldown(self.basic_cooldown)
    }

    /// Respawn delay as a duration.
    #[must_use]
    pub fn respawn_delay(&self, config: &BehaviorConfig) -> Duration {
        config.respawn_delay(self.respawn_time)
    }

    /// Validates the template.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.name.is_empty() {
            return Err(CatalogError::ValidationError(format!(
                "Species {} has empty name",
                self.species
            )));
        }

        if self.max_hp == 0 {
            return Err(CatalogError::ValidationError(format!(
                "Species {} has zero max_hp",
                self.species
            )));
        }

        for skill in &self.skills {
            if skill.mp_cost > self.max_mp {
                return Err(CatalogError::ValidationError(format!(
                    "Species {} skill {} costs {} mp but max_mp is {}",
                    self.species,
                    skill.skill.raw(),
                    skill.mp_cost,
                    self.max_mp
                )));
            }
        }

        if self.aggressive && self.basic_range == 0 && self.skills.is_empty() {
            warn!("Species {} is aggressive but can never attack", self.species);
        }

        Ok(())
    }
}

/// Read access to species templates.
pub trait TemplateCatalog: Send + Sync {
    /// Returns the template of a species, if known.
    fn template(&self, species: SpeciesId) -> Option<Arc<MonsterTemplate>>;
}

/// A collection of species from a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesFile {
    /// Species in this file.
    #[serde(default)]
    pub species: Vec<MonsterTemplate>,
}

/// In-memory species catalog.
#[derive(Debug, Default)]
pub struct SpeciesCatalog {
    by_id: HashMap<SpeciesId, Arc<MonsterTemplate>>,
}

impl SpeciesCatalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&content)?;
        info!("Loaded {} species from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parses a catalog from TOML text.
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let file: SpeciesFile = toml::from_str(content)?;
        let mut catalog = Self::new();
        for template in file.species {
            catalog.register(template)?;
        }
        Ok(catalog)
    }

    /// Validates and registers a template.
    pub fn register(&mut self, template: MonsterTemplate) -> CatalogResult<()> {
        template.validate()?;
        if self.by_id.contains_key(&template.species) {
            return Err(CatalogError::DuplicateId(template.species));
        }
        debug!("Registered species {} ({})", template.species, template.name);
        self.by_id.insert(template.species, Arc::new(template));
        Ok(())
    }

    /// Returns the number of registered species.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterates over all templates.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MonsterTemplate>> {
        self.by_id.values()
    }
}

impl TemplateCatalog for SpeciesCatalog {
    fn template(&self, species: SpeciesId) -> Option<Arc<MonsterTemplate>> {
        self.by_id.get(&species).cloned()
    }
}
