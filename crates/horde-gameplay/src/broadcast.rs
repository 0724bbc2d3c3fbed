//! Outgoing notifications.
//!
//! The engine never writes to sockets. Every observable change is handed to a
//! [`Broadcaster`] either for everyone on a map or for a single character.
//! [`ChannelBroadcaster`] is an outbox the network layer (or a test) drains.

use crossbeam_channel::{bounded, Receiver, Sender};
use horde_common::{Cell, CharacterId, MapId, MonsterId, SkillId, SpeciesId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// How an attack was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    /// A castable skill.
    Skill {
        /// Skill identifier
        skill: SkillId,
        /// Cooldown in skill cooldown units
        cooldown: u16,
        /// Animation played on impact
        attack_animation: u16,
        /// Effect shown on impact
        effect: u16,
        /// Where the attacker stood
        origin: Cell,
    },
    /// The species' basic attack (also used for splash hits).
    Basic {
        /// Cooldown in basic cooldown units
        cooldown: u16,
        /// Effect shown on impact
        effect: u16,
    },
}

/// Outcome of one hit, as shown to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Attacker
    pub monster: MonsterId,
    /// Character that was hit
    pub target: CharacterId,
    /// Skill or basic attack
    pub kind: AttackKind,
    /// Whether the target survived
    pub target_alive: bool,
    /// Target health after the hit, as a truncated percentage
    pub hp_percent: u8,
    /// Damage dealt
    pub damage: u32,
}

/// A message describing a monster-side change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonsterMessage {
    /// Full appearance of an alive monster.
    Snapshot {
        /// Monster
        monster: MonsterId,
        /// Species
        species: SpeciesId,
        /// Current cell
        cell: Cell,
        /// Facing direction
        facing: u8,
        /// Health as a truncated percentage
        hp_percent: u8,
        /// Mana as a truncated percentage
        mp_percent: u8,
    },
    /// Visual effect attached to a monster.
    Effect {
        /// Monster
        monster: MonsterId,
        /// Effect identifier
        effect: u16,
    },
    /// Movement towards a cell.
    Move {
        /// Monster
        monster: MonsterId,
        /// Destination
        to: Cell,
        /// Movement speed
        speed: u8,
        /// Announced travel time
        duration_ms: u64,
    },
    /// A skill cast started.
    Cast {
        /// Monster
        monster: MonsterId,
        /// Character being cast at
        target: CharacterId,
        /// Animation played when the cast starts
        cast_animation: u16,
        /// Effect shown while casting
        cast_effect: u16,
        /// Skill being cast
        skill: SkillId,
    },
    /// A hit landed.
    AttackResult(AttackReport),
    /// A seated character was forced to stand.
    StandUp {
        /// Character
        character: CharacterId,
    },
    /// A character's own stats changed.
    StatRefresh {
        /// Character
        character: CharacterId,
    },
}

/// Who receives a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    /// Every observer on the map
    Map(MapId),
    /// A single character
    Character(CharacterId),
}

/// A message with its audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Recipients
    pub audience: Audience,
    /// Payload
    pub message: MonsterMessage,
}

/// Sink for outgoing notifications.
pub trait Broadcaster: Send + Sync {
    /// Sends a message to every observer on a map.
    fn notify_region(&self, map: MapId, message: MonsterMessage);

    /// Sends a message to one character.
    fn notify_one(&self, character: CharacterId, message: MonsterMessage);
}

/// Bounded outbox of envelopes.
#[derive(Debug)]
pub struct ChannelBroadcaster {
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
    capacity: usize,
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl ChannelBroadcaster {
    /// Creates a new outbox with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    fn publish(&self, envelope: Envelope) {
        // Non-blocking: a full outbox drops the message
        if self.sender.try_send(envelope).is_err() {
            trace!("Broadcast outbox full, dropping message");
        }
    }

    /// Drains all pending envelopes.
    pub fn drain(&self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Ok(envelope) = self.receiver.try_recv() {
            envelopes.push(envelope);
        }
        envelopes
    }

    /// Returns the number of pending envelopes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new receiver handle for a consumer thread.
    #[must_use]
    pub fn receiver(&self) -> Receiver<Envelope> {
        self.receiver.clone()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn notify_region(&self, map: MapId, message: MonsterMessage) {
        self.publish(Envelope {
            audience: Audience::Map(map),
            message,
        });
    }

    fn notify_one(&self, character: CharacterId, message: MonsterMessage) {
        self.publish(Envelope {
            audience: Audience::Character(character),
            message,
        });
    }
}
