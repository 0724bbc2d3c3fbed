//! Shared harness for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use horde_common::{Cell, CharacterId, MapId, MonsterId, Timestamp};
use horde_gameplay::{
    AttackReport, BehaviorConfig, BehaviorEngine, ChannelBroadcaster, CharacterDirectory,
    Envelope, GridMap, MonsterInstance, MonsterMessage, MonsterTemplate, PlayerCharacter,
    SpawnPoint, World,
};

pub const MAP: MapId = MapId::new(7);

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub grid: GridMap,
    pub directory: CharacterDirectory,
    pub outbox: ChannelBroadcaster,
    pub engine: BehaviorEngine,
}

impl Harness {
    pub fn new(config: BehaviorConfig) -> Self {
        Self::with_grid(config, GridMap::new(80, 80))
    }

    pub fn with_grid(config: BehaviorConfig, grid: GridMap) -> Self {
        init_tracing();
        Self {
            grid,
            directory: CharacterDirectory::new(),
            outbox: ChannelBroadcaster::new(65_536),
            engine: BehaviorEngine::new(config),
        }
    }

    pub fn world(&self) -> World<'_> {
        World::new(&self.grid, &self.directory, &self.outbox)
    }

    pub fn spawn(&self, template: MonsterTemplate, cell: Cell) -> MonsterInstance {
        let point = SpawnPoint::new(template.species, MAP, cell);
        MonsterInstance::spawn(
            MonsterId::FLOOR,
            Arc::new(template),
            &point,
            Timestamp::ZERO,
            self.engine.config(),
        )
    }

    pub fn character(&self, id: u64, cell: Cell, max_hp: u32) -> Arc<PlayerCharacter> {
        self.directory
            .insert(PlayerCharacter::new(CharacterId::new(id), MAP, cell, max_hp))
    }

    pub fn tick(&self, monster: &mut MonsterInstance, ms: u64) -> Vec<Envelope> {
        self.engine
            .tick(monster, &self.world(), Timestamp::from_millis(ms));
        self.outbox.drain()
    }
}

pub fn attack_reports(envelopes: &[Envelope]) -> Vec<AttackReport> {
    envelopes
        .iter()
        .filter_map(|e| match e.message {
            MonsterMessage::AttackResult(report) => Some(report),
            _ => None,
        })
        .collect()
}

pub fn move_count(envelopes: &[Envelope]) -> usize {
    envelopes
        .iter()
        .filter(|e| matches!(e.message, MonsterMessage::Move { .. }))
        .count()
}
