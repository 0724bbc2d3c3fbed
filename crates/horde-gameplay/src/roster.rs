//! Per-map ownership of monster instances.
//!
//! The roster allocates identifiers, spawns instances from the species
//! catalog, and serialises every access to an instance behind its own mutex,
//! so a tick and externally applied damage never interleave. A full map tick
//! fans instances out over worker threads; each instance is evaluated by
//! exactly one worker.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use dashmap::DashMap;
use horde_common::{CharacterId, MapId, MonsterId, Timestamp};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::allocator::allocate_monster_id;
use crate::behavior::{BehaviorEngine, World};
use crate::broadcast::Broadcaster;
use crate::instance::{
    DamageOutcome, MonsterError, MonsterInstance, MonsterResult, SpawnPoint, StateKind,
};
use crate::session::SessionDirectory;
use crate::template::TemplateCatalog;

/// Shared handle to an instance.
pub type InstanceHandle = Arc<Mutex<MonsterInstance>>;

/// Monsters living on one map.
pub struct MonsterRoster {
    map: MapId,
    catalog: Arc<dyn TemplateCatalog>,
    instances: DashMap<MonsterId, InstanceHandle>,
    spawn_lock: Mutex<()>,
}

impl MonsterRoster {
    /// Creates an empty roster for a map.
    #[must_use]
    pub fn new(map: MapId, catalog: Arc<dyn TemplateCatalog>) -> Self {
        Self {
            map,
            catalog,
            instances: DashMap::new(),
            spawn_lock: Mutex::new(()),
        }
    }

    /// Map this roster owns.
    #[must_use]
    pub const fn map(&self) -> MapId {
        self.map
    }

    /// Number of instances, alive or dead.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if the roster holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Identifiers of every instance, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<MonsterId> {
        let mut ids: Vec<MonsterId> = self.instances.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Looks up an instance.
    #[must_use]
    pub fn get(&self, id: MonsterId) -> Option<InstanceHandle> {
        self.instances.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Spawns a monster and announces it to the map.
    pub fn spawn(
        &self,
        point: &SpawnPoint,
        engine: &BehaviorEngine,
        broadcast: &dyn Broadcaster,
        now: Timestamp,
    ) -> MonsterResult<MonsterId> {
        if point.map != self.map {
            return Err(MonsterError::InvariantViolation(format!(
                "spawn point on map {} given to roster of map {}",
                point.map.raw(),
                self.map.raw()
            )));
        }
        let template = self
            .catalog
            .template(point.species)
            .ok_or(MonsterError::UnknownSpecies(point.species))?;

        let (id, snapshot) = {
            let _guard = self.spawn_lock.lock();
            let id = allocate_monster_id(self.instances.iter().map(|e| *e.key()))?;
            let instance = MonsterInstance::spawn(id, template, point, now, engine.config());
            let snapshot = instance.snapshot();
            self.instances.insert(id, Arc::new(Mutex::new(instance)));
            (id, snapshot)
        };

        if let Some(snapshot) = snapshot {
            broadcast.notify_region(self.map, snapshot);
        }
        info!("Spawned {} ({}) at {:?}", id, point.species, point.cell);
        Ok(id)
    }

    /// Removes an instance.
    ///
    /// Revival prompts the instance still owes are delivered immediately.
    pub fn despawn(&self, id: MonsterId, sessions: &dyn SessionDirectory) -> MonsterResult<()> {
        let (_, handle) = self
            .instances
            .remove(&id)
            .ok_or(MonsterError::NotFound(id))?;

        let owed = handle.lock().take_revivals();
        for character in owed {
            debug!("{} despawned owing a revival prompt to {}", id, character);
            sessions.trigger_revival_prompt(character);
        }
        Ok(())
    }

    /// Removes dead instances that will never respawn and returns their ids.
    ///
    /// An instance that still owes a revival prompt is kept until the prompt
    /// has been settled.
    pub fn reclaim_inert(&self) -> Vec<MonsterId> {
        let inert: Vec<MonsterId> = self
            .instances
            .iter()
            .filter(|e| {
                let m = e.value().lock();
                !m.is_alive() && !m.respawns() && !m.owes_revival()
            })
            .map(|e| *e.key())
            .collect();

        for id in &inert {
            self.instances.remove(id);
        }
        inert
    }

    /// Applies damage from a character to a monster.
    pub fn apply_damage(
        &self,
        id: MonsterId,
        attacker: CharacterId,
        amount: u32,
        now: Timestamp,
    ) -> MonsterResult<DamageOutcome> {
        let handle = self.get(id).ok_or(MonsterError::NotFound(id))?;
        let mut monster = handle.lock();
        monster.receive_damage(attacker, amount, now)
    }

    /// Ticks one instance.
    pub fn tick(
        &self,
        id: MonsterId,
        engine: &BehaviorEngine,
        world: &World<'_>,
        now: Timestamp,
    ) -> MonsterResult<StateKind> {
        let handle = self.get(id).ok_or(MonsterError::NotFound(id))?;
        let mut monster = handle.lock();
        Ok(engine.tick(&mut monster, world, now))
    }

    /// Applies due continuations on every instance without evaluating behavior.
    pub fn settle(&self, engine: &BehaviorEngine, world: &World<'_>, now: Timestamp) {
        for handle in self.handles() {
            engine.settle(&mut handle.lock(), world, now);
        }
    }

    /// Ticks every instance across `workers` threads and returns how many
    /// ended in each state.
    pub fn tick_all(
        &self,
        engine: &BehaviorEngine,
        world: &World<'_>,
        now: Timestamp,
        workers: usize,
    ) -> RosterSummary {
        let (sender, receiver) = unbounded::<InstanceHandle>();
        for handle in self.handles() {
            // Receiver is alive for the whole function
            let _ = sender.send(handle);
        }
        drop(sender);

        let workers = workers.max(1);
        let summary = thread::scope(|scope| {
            let joins: Vec<_> = (0..workers)
                .map(|_| {
                    let receiver = receiver.clone();
                    scope.spawn(move || {
                        let mut summary = RosterSummary::default();
                        while let Ok(handle) = receiver.recv() {
                            let state = engine.tick(&mut handle.lock(), world, now);
                            summary.record(state);
                        }
                        summary
                    })
                })
                .collect();

            joins
                .into_iter()
                .filter_map(|join| match join.join() {
                    Ok(summary) => Some(summary),
                    Err(_) => {
                        warn!(
                            "Map {} tick worker panicked; its instances are missing from the summary",
                            self.map.raw()
                        );
                        None
                    },
                })
                .fold(RosterSummary::default(), RosterSummary::merge)
        });

        debug!(
            "Map {} tick: {} idle, {} pursuing, {} engaging, {} dead",
            self.map.raw(),
            summary.idle,
            summary.pursuing,
            summary.engaging,
            summary.dead
        );
        summary
    }

    fn handles(&self) -> Vec<InstanceHandle> {
        self.instances.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

/// Count of instances per state after a map tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterSummary {
    /// Idle instances
    pub idle: usize,
    /// Pursuing instances
    pub pursuing: usize,
    /// Engaging instances
    pub engaging: usize,
    /// Dead instances
    pub dead: usize,
}

impl RosterSummary {
    fn record(&mut self, state: StateKind) {
        match state {
            StateKind::Idle => self.idle += 1,
            StateKind::Pursuing => self.pursuing += 1,
            StateKind::Engaging => self.engaging += 1,
            StateKind::Dead => self.dead += 1,
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            idle: self.idle + other.idle,
            pursuing: self.pursuing + other.pursuing,
            engaging: self.engaging + other.engaging,
            dead: self.dead + other.dead,
        }
    }

    /// Total instances counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.idle + self.pursuing + self.engaging + self.dead
    }
}
