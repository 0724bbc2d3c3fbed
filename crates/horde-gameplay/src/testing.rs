//! Shared fixture for unit tests.

use std::sync::Arc;

use horde_common::{Cell, CharacterId, MapId, MonsterId, Timestamp};

use crate::behavior::{BehaviorEngine, World};
use crate::broadcast::ChannelBroadcaster;
use crate::config::BehaviorConfig;
use crate::grid::GridMap;
use crate::instance::{MonsterInstance, SpawnPoint};
use crate::session::{CharacterDirectory, PlayerCharacter};
use crate::template::MonsterTemplate;

pub(crate) const MAP: MapId = MapId::new(1);

pub(crate) struct Fixture {
    pub grid: GridMap,
    pub directory: CharacterDirectory,
    pub outbox: ChannelBroadcaster,
    pub engine: BehaviorEngine,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_engine(BehaviorEngine::default())
    }

    pub fn with_config(config: BehaviorConfig) -> Self {
        Self::with_engine(BehaviorEngine::new(config))
    }

    pub fn with_engine(engine: BehaviorEngine) -> Self {
        Self {
            grid: GridMap::new(64, 64),
            directory: CharacterDirectory::new(),
            outbox: ChannelBroadcaster::default(),
            engine,
        }
    }

    pub fn world(&self) -> World<'_> {
        World::new(&self.grid, &self.directory, &self.outbox)
    }

    pub fn spawn(&self, template: MonsterTemplate, cell: Cell) -> MonsterInstance {
        let point = SpawnPoint::new(template.species, MAP, cell);
        self.spawn_at(template, &point)
    }

    pub fn spawn_fixed(&self, template: MonsterTemplate, cell: Cell) -> MonsterInstance {
        let point = SpawnPoint::new(template.species, MAP, cell).with_mobile(false);
        self.spawn_at(template, &point)
    }

    fn spawn_at(&self, template: MonsterTemplate, point: &SpawnPoint) -> MonsterInstance {
        MonsterInstance::spawn(
            MonsterId::FLOOR,
            Arc::new(template),
            point,
            Timestamp::ZERO,
            self.engine.config(),
        )
    }

    pub fn add_character(&self, id: u64, cell: Cell) -> Arc<PlayerCharacter> {
        self.directory
            .insert(PlayerCharacter::new(CharacterId::new(id), MAP, cell, 1000))
    }
}
