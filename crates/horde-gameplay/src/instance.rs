//! Live monster instances.
//!
//! A [`MonsterInstance`] is one spawned copy of a species: its vitals, its
//! position, its behavior state, the waypoints it still has to walk, skill
//! cooldown timestamps, the threat ledger, and the deferred continuations it
//! has queued. All mutation goes through the behavior engine or the roster,
//! which hold the instance's lock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use horde_common::{Cell, CharacterId, HordeError, MapId, MonsterId, SpeciesId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::broadcast::MonsterMessage;
use crate::config::BehaviorConfig;
use crate::continuation::{Continuation, ContinuationQueue};
use crate::template::MonsterTemplate;

/// Error types for monster operations.
#[derive(Debug, Error)]
pub enum MonsterError {
    /// Every identifier in the monster range is taken
    #[error("No free monster id in [{floor}, {ceiling})")]
    IdSpaceExhausted {
        /// Lowest identifier searched
        floor: u32,
        /// Exclusive upper bound searched
        ceiling: u32,
    },
    /// Species not in the catalog
    #[error("Unknown species: {0}")]
    UnknownSpecies(SpeciesId),
    /// Monster not found
    #[error("Monster not found: {0}")]
    NotFound(MonsterId),
    /// Damage applied to a dead monster
    #[error("Monster is dead: {0}")]
    Dead(MonsterId),
    /// A state invariant was violated
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result type for monster operations.
pub type MonsterResult<T> = Result<T, MonsterError>;

impl From<MonsterError> for HordeError {
    fn from(e: MonsterError) -> Self {
        match e {
            MonsterError::IdSpaceExhausted { .. } => Self::ResourceExhausted(e.to_string()),
            MonsterError::UnknownSpecies(species) => Self::NotFound {
                kind: "species",
                id: species.to_string(),
            },
            MonsterError::NotFound(id) => Self::NotFound {
                kind: "monster",
                id: id.to_string(),
            },
            MonsterError::Dead(_) => Self::InvariantViolation(e.to_string()),
            MonsterError::InvariantViolation(msg) => Self::InvariantViolation(msg),
        }
    }
}

/// Where and how a monster is placed on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Species to spawn
    pub species: SpeciesId,
    /// Map the monster lives on
    pub map: MapId,
    /// Anchor cell: spawn position, wander centre, and return point
    pub cell: Cell,
    /// Initial facing direction
    #[serde(default)]
    pub facing: u8,
    /// Whether this spawn is allowed to move at all
    #[serde(default = "default_mobile")]
    pub mobile: bool,
}

const fn default_mobile() -> bool {
    true
}

impl SpawnPoint {
    /// Creates a mobile spawn point facing direction 0.
    #[must_use]
    pub const fn new(species: SpeciesId, map: MapId, cell: Cell) -> Self {
        Self {
            species,
            map,
            cell,
            facing: 0,
            mobile: true,
        }
    }

    /// Sets whether the spawn may move.
    #[must_use]
    pub const fn with_mobile(mut self, mobile: bool) -> Self {
        self.mobile = mobile;
        self
    }

    /// Sets the initial facing.
    #[must_use]
    pub const fn with_facing(mut self, facing: u8) -> Self {
        self.facing = facing;
        self
    }
}

/// Coarse behavior state, as reported by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Waiting to respawn (or never)
    Dead,
    /// Wandering around the anchor, no target
    Idle,
    /// Has a target that is out of reach
    Pursuing,
    /// Has a target in reach of a skill or the basic attack
    Engaging,
}

/// Behavior state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Dead since the given time
    Dead {
        /// Time of death
        since: Timestamp,
    },
    /// No target
    Idle,
    /// Chasing a target that is out of reach
    Pursuing(CharacterId),
    /// Attacking a target in reach
    Engaging(CharacterId),
}

impl BehaviorState {
    /// Coarse kind of this state.
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Dead { .. } => StateKind::Dead,
            Self::Idle => StateKind::Idle,
            Self::Pursuing(_) => StateKind::Pursuing,
            Self::Engaging(_) => StateKind::Engaging,
        }
    }

    /// Current target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<CharacterId> {
        match self {
            Self::Pursuing(id) | Self::Engaging(id) => Some(*id),
            Self::Dead { .. } | Self::Idle => None,
        }
    }

    /// Returns true unless dead.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !matches!(self, Self::Dead { .. })
    }
}

/// Damage accumulated per attacker since the last respawn.
#[derive(Debug, Clone, Default)]
pub struct ThreatLedger {
    damage: AHashMap<CharacterId, u64>,
}

impl ThreatLedger {
    /// Records damage from an attacker.
    pub fn record(&mut self, attacker: CharacterId, amount: u32) {
        *self.damage.entry(attacker).or_insert(0) += u64::from(amount);
    }

    /// Damage dealt by one attacker.
    #[must_use]
    pub fn damage_from(&self, attacker: CharacterId) -> u64 {
        self.damage.get(&attacker).copied().unwrap_or(0)
    }

    /// Damage dealt by everyone.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.damage.values().sum()
    }

    /// Attacker with the most recorded damage.
    #[must_use]
    pub fn top_attacker(&self) -> Option<CharacterId> {
        self.damage
            .iter()
            .max_by_key(|(id, dealt)| (**dealt, std::cmp::Reverse(**id)))
            .map(|(id, _)| *id)
    }

    /// Iterates over attackers and their damage.
    pub fn iter(&self) -> impl Iterator<Item = (CharacterId, u64)> + '_ {
        self.damage.iter().map(|(id, dealt)| (*id, *dealt))
    }

    /// Number of distinct attackers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.damage.len()
    }

    /// Returns true if nobody has dealt damage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damage.is_empty()
    }

    /// Forgets every attacker.
    pub fn clear(&mut self) {
        self.damage.clear();
    }
}

/// Result of applying damage to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Health left after the hit
    pub remaining_hp: u32,
    /// Whether this hit killed the instance
    pub killed: bool,
}

/// One spawned monster.
#[derive(Debug)]
pub struct MonsterInstance {
    pub(crate) id: MonsterId,
    pub(crate) template: Arc<MonsterTemplate>,
    pub(crate) map: MapId,
    pub(crate) anchor: Cell,
    pub(crate) cell: Cell,
    pub(crate) facing: u8,
    pub(crate) mobile: bool,
    pub(crate) respawns: bool,
    pub(crate) hp: u32,
    pub(crate) mp: u32,
    pub(crate) state: BehaviorState,
    pub(crate) path: VecDeque<Cell>,
    pub(crate) skill_last_use: Vec<Option<Timestamp>>,
    pub(crate) last_move: Timestamp,
    pub(crate) last_attack: Timestamp,
    pub(crate) idle_move_delay: Duration,
    pub(crate) waiting: bool,
    pub(crate) pending: ContinuationQueue,
    pub(crate) threat: ThreatLedger,
    pub(crate) rng: fastrand::Rng,
}

impl MonsterInstance {
    /// Creates a fresh, alive instance at the spawn point's anchor.
    ///
    /// The random generator is seeded from the identifier, so two runs with
    /// the same inputs make the same decisions.
    #[must_use]
    pub fn spawn(
        id: MonsterId,
        template: Arc<MonsterTemplate>,
        point: &SpawnPoint,
        now: Timestamp,
        config: &BehaviorConfig,
    ) -> Self {
        Self::spawn_seeded(id, template, point, now, config, u64::from(id.raw()))
    }

    /// Creates a fresh instance with an explicit random seed.
    #[must_use]
    pub fn spawn_seeded(
        id: MonsterId,
        template: Arc<MonsterTemplate>,
        point: &SpawnPoint,
        now: Timestamp,
        config: &BehaviorConfig,
        seed: u64,
    ) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let (lo, hi) = (config.initial_idle_move_min_ms, config.initial_idle_move_max_ms);
        let idle_move_delay = Duration::from_millis(rng.u64(lo..hi.max(lo + 1)));

        Self {
            id,
            map: point.map,
            anchor: point.cell,
            cell: point.cell,
            facing: point.facing,
            mobile: point.mobile,
            respawns: template.respawns,
            hp: template.max_hp,
            mp: template.max_mp,
            state: BehaviorState::Idle,
            path: VecDeque::new(),
            skill_last_use: vec![None; template.skills.len()],
            last_move: now,
            last_attack: now,
            idle_move_delay,
            waiting: false,
            pending: ContinuationQueue::new(),
            threat: ThreatLedger::default(),
            rng,
            template,
        }
    }

    /// Instance identifier.
    #[must_use]
    pub const fn id(&self) -> MonsterId {
        self.id
    }

    /// Species template.
    #[must_use]
    pub fn template(&self) -> &Arc<MonsterTemplate> {
        &self.template
    }

    /// Species identifier.
    #[must_use]
    pub fn species(&self) -> SpeciesId {
        self.template.species
    }

    /// Map the instance lives on.
    #[must_use]
    pub const fn map(&self) -> MapId {
        self.map
    }

    /// Anchor cell.
    #[must_use]
    pub const fn anchor(&self) -> Cell {
        self.anchor
    }

    /// Current cell.
    #[must_use]
    pub const fn cell(&self) -> Cell {
        self.cell
    }

    /// Facing direction.
    #[must_use]
    pub const fn facing(&self) -> u8 {
        self.facing
    }

    /// Current health.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// Current mana.
    #[must_use]
    pub const fn mp(&self) -> u32 {
        self.mp
    }

    /// Behavior state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.state
    }

    /// Current target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<CharacterId> {
        self.state.target()
    }

    /// Returns true unless dead.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Time of death, if dead.
    #[must_use]
    pub const fn died_at(&self) -> Option<Timestamp> {
        match self.state {
            BehaviorState::Dead { since } => Some(since),
            _ => None,
        }
    }

    /// Waypoints still to walk.
    pub fn path(&self) -> impl ExactSizeIterator<Item = &Cell> {
        self.path.iter()
    }

    /// Threat ledger.
    #[must_use]
    pub const fn threat(&self) -> &ThreatLedger {
        &self.threat
    }

    /// Whether this spawn may move.
    #[must_use]
    pub const fn is_mobile(&self) -> bool {
        self.mobile
    }

    /// Whether the instance moves at all (mobile spawn with nonzero speed).
    #[must_use]
    pub fn can_move(&self) -> bool {
        self.mobile && self.template.can_move()
    }

    /// Whether the instance comes back after death.
    #[must_use]
    pub const fn respawns(&self) -> bool {
        self.respawns
    }

    /// Overrides the species' respawn flag for this instance.
    pub fn set_respawns(&mut self, respawns: bool) {
        self.respawns = respawns;
    }

    /// Time of the last landed attack (spawn time before the first).
    #[must_use]
    pub const fn last_attack(&self) -> Timestamp {
        self.last_attack
    }

    /// Last use of the skill at `index`, if ever used.
    #[must_use]
    pub fn skill_last_use(&self, index: usize) -> Option<Timestamp> {
        self.skill_last_use.get(index).copied().flatten()
    }

    /// Where the instance will stand once queued travel is over.
    #[must_use]
    pub fn planned_cell(&self) -> Cell {
        self.pending.last_relocation().unwrap_or(self.cell)
    }

    /// Returns true while a strike is waiting to land.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.pending.has_strike()
    }

    /// Number of queued continuations.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Health as a truncated percentage.
    #[must_use]
    pub fn hp_percent(&self) -> u8 {
        percent(self.hp, self.template.max_hp)
    }

    /// Mana as a truncated percentage.
    #[must_use]
    pub fn mp_percent(&self) -> u8 {
        percent(self.mp, self.template.max_mp)
    }

    /// Full appearance for observers; `None` while dead.
    #[must_use]
    pub fn snapshot(&self) -> Option<MonsterMessage> {
        if !self.is_alive() {
            return None;
        }
        Some(MonsterMessage::Snapshot {
            monster: self.id,
            species: self.template.species,
            cell: self.cell,
            facing: self.facing,
            hp_percent: self.hp_percent(),
            mp_percent: self.mp_percent(),
        })
    }

    /// Visual-effect cue attached to this monster.
    #[must_use]
    pub const fn effect(&self, effect: u16) -> MonsterMessage {
        MonsterMessage::Effect {
            monster: self.id,
            effect,
        }
    }

    /// Applies damage from an attacker.
    ///
    /// Health is clamped at zero; reaching zero records the death.
    pub fn receive_damage(
        &mut self,
        attacker: CharacterId,
        amount: u32,
        now: Timestamp,
    ) -> MonsterResult<DamageOutcome> {
        if !self.is_alive() {
            return Err(MonsterError::Dead(self.id));
        }

        self.threat.record(attacker, amount);
        self.set_hp(self.hp.saturating_sub(amount));

        let killed = self.hp == 0;
        if killed {
            self.die(now);
        }

        Ok(DamageOutcome {
            remaining_hp: self.hp,
            killed,
        })
    }

    /// Records death: target and path cleared, pending strikes dropped.
    pub fn die(&mut self, now: Timestamp) {
        info!("{} ({}) died", self.id, self.template.name);
        self.hp = 0;
        self.state = BehaviorState::Dead { since: now };
        self.path.clear();
        self.waiting = false;
        self.pending.cancel_strikes();
    }

    /// Brings the instance back at its anchor with full vitals and no memory.
    pub fn respawn(&mut self, now: Timestamp) {
        self.threat.clear();
        self.state = BehaviorState::Idle;
        self.hp = self.template.max_hp;
        self.mp = self.template.max_mp;
        self.cell = self.anchor;
        self.path.clear();
        self.waiting = false;
        self.pending.retain_revivals();
        self.last_move = now;
    }

    /// Sets the target and enters pursuit.
    pub(crate) fn set_target(&mut self, target: CharacterId) {
        debug_assert!(self.is_alive(), "dead monsters cannot acquire targets");
        if self.is_alive() {
            self.state = BehaviorState::Pursuing(target);
        }
    }

    /// Drops the target and goes idle, abandoning any strike planned
    /// against it.
    pub(crate) fn clear_target(&mut self) {
        if self.is_alive() {
            self.state = BehaviorState::Idle;
            self.waiting = false;
            self.pending.cancel_strikes();
        }
    }

    /// Returns true while a revival prompt is still owed to a character.
    #[must_use]
    pub fn owes_revival(&self) -> bool {
        self.pending.has_revival()
    }

    /// Removes owed revival prompts and returns the characters they were for.
    pub(crate) fn take_revivals(&mut self) -> Vec<CharacterId> {
        self.pending.take_revivals()
    }

    pub(crate) fn set_hp(&mut self, hp: u32) {
        debug_assert!(hp <= self.template.max_hp, "hp {hp} above max");
        self.hp = hp.min(self.template.max_hp);
    }

    pub(crate) fn spend_mp(&mut self, cost: u32) {
        debug_assert!(cost <= self.mp, "mp cost {cost} above current {}", self.mp);
        self.mp = self.mp.saturating_sub(cost);
    }

    pub(crate) fn schedule(&mut self, due: Timestamp, action: Continuation) {
        self.pending.schedule(due, action);
    }

    /// Places the instance somewhere else on its map without travel.
    pub fn teleport(&mut self, cell: Cell) {
        self.cell = cell;
        self.path.clear();
    }
}

fn percent(value: u32, max: u32) -> u8 {
    if max == 0 {
        return 0;
    }
    let pct = u64::from(value.min(max)) * 100 / u64::from(max);
    u8::try_from(pct).unwrap_or(100)
}
