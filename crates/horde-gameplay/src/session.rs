//! Player characters as seen by monsters.
//!
//! The engine only talks to characters through [`CharacterSession`] and finds
//! them through a [`SessionDirectory`]. [`CharacterDirectory`] is an
//! in-memory directory of [`PlayerCharacter`]s usable by servers that keep
//! characters in process, and by tests.

use std::sync::Arc;

use dashmap::DashMap;
use horde_common::{Cell, CharacterId, MapId};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// A live character session.
///
/// Implementations are shared across worker threads; every method takes
/// `&self` and synchronises internally.
pub trait CharacterSession: Send + Sync {
    /// Character identifier.
    fn id(&self) -> CharacterId;
    /// Map the character is on.
    fn map(&self) -> MapId;
    /// Cell the character stands on.
    fn cell(&self) -> Cell;
    /// Current health.
    fn hp(&self) -> u32;
    /// Maximum health.
    fn max_hp(&self) -> u32;
    /// Hidden from other players.
    fn is_invisible(&self) -> bool;
    /// Hidden administrator.
    fn is_invisible_gm(&self) -> bool;
    /// Sitting down.
    fn is_seated(&self) -> bool;
    /// Forces the character to stand.
    fn stand_up(&self);
    /// Immune to damage.
    fn has_invulnerability(&self) -> bool;
    /// Reduces health (clamped at zero) and returns what is left.
    fn apply_damage(&self, amount: u32) -> u32;

    /// Health as a truncated percentage.
    fn health_percent(&self) -> u8 {
        let max = self.max_hp();
        if max == 0 {
            return 0;
        }
        let pct = u64::from(self.hp().min(max)) * 100 / u64::from(max);
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Shared handle to a session.
pub type SessionHandle = Arc<dyn CharacterSession>;

/// Lookup of live character sessions.
pub trait SessionDirectory: Send + Sync {
    /// Resolves a character's session, wherever it is.
    fn resolve_character_session(&self, id: CharacterId) -> Option<SessionHandle>;

    /// First character on `map` within `radius` of `origin` that satisfies
    /// `predicate`, in the directory's enumeration order.
    fn find_nearest_hostile(
        &self,
        map: MapId,
        origin: Cell,
        radius: u32,
        predicate: &dyn Fn(&dyn CharacterSession) -> bool,
    ) -> Option<SessionHandle>;

    /// Every character on `map` within `radius` of `center`.
    fn list_characters_in_radius(&self, map: MapId, center: Cell, radius: u32)
        -> Vec<SessionHandle>;

    /// Asks a dead character whether to revive.
    fn trigger_revival_prompt(&self, id: CharacterId);
}

#[derive(Debug, Clone)]
struct CharacterState {
    map: MapId,
    cell: Cell,
    hp: u32,
    seated: bool,
    invisible: bool,
    invisible_gm: bool,
    invulnerable: bool,
}

/// An in-process character.
#[derive(Debug)]
pub struct PlayerCharacter {
    id: CharacterId,
    max_hp: u32,
    state: RwLock<CharacterState>,
}

impl PlayerCharacter {
    /// Creates a new character at full health.
    #[must_use]
    pub fn new(id: CharacterId, map: MapId, cell: Cell, max_hp: u32) -> Self {
        Self {
            id,
            max_hp,
            state: RwLock::new(CharacterState {
                map,
                cell,
                hp: max_hp,
                seated: false,
                invisible: false,
                invisible_gm: false,
                invulnerable: false,
            }),
        }
    }

    /// Starts the character seated.
    #[must_use]
    pub fn with_seated(self, seated: bool) -> Self {
        self.state.write().seated = seated;
        self
    }

    /// Starts the character invisible.
    #[must_use]
    pub fn with_invisible(self, invisible: bool) -> Self {
        self.state.write().invisible = invisible;
        self
    }

    /// Starts the character as a hidden administrator.
    #[must_use]
    pub fn with_invisible_gm(self, invisible_gm: bool) -> Self {
        self.state.write().invisible_gm = invisible_gm;
        self
    }

    /// Makes the character immune to damage.
    #[must_use]
    pub fn with_invulnerability(self, invulnerable: bool) -> Self {
        self.state.write().invulnerable = invulnerable;
        self
    }

    /// Moves the character.
    pub fn set_cell(&self, cell: Cell) {
        self.state.write().cell = cell;
    }

    /// Moves the character to another map.
    pub fn set_map(&self, map: MapId, cell: Cell) {
        let mut state = self.state.write();
        state.map = map;
        state.cell = cell;
    }

    /// Sets health (clamped to max).
    pub fn set_hp(&self, hp: u32) {
        self.state.write().hp = hp.min(self.max_hp);
    }

    /// Sits down or stands up.
    pub fn set_seated(&self, seated: bool) {
        self.state.write().seated = seated;
    }

    /// Toggles invisibility.
    pub fn set_invisible(&self, invisible: bool) {
        self.state.write().invisible = invisible;
    }
}

impl CharacterSession for PlayerCharacter {
    fn id(&self) -> CharacterId {
        self.id
    }

    fn map(&self) -> MapId {
        self.state.read().map
    }

    fn cell(&self) -> Cell {
        self.state.read().cell
    }

    fn hp(&self) -> u32 {
        self.state.read().hp
    }

    fn max_hp(&self) -> u32 {
        self.max_hp
    }

    fn is_invisible(&self) -> bool {
        self.state.read().invisible
    }

    fn is_invisible_gm(&self) -> bool {
        self.state.read().invisible_gm
    }

    fn is_seated(&self) -> bool {
        self.state.read().seated
    }

    fn stand_up(&self) {
        self.state.write().seated = false;
    }

    fn has_invulnerability(&self) -> bool {
        self.state.read().invulnerable
    }

    fn apply_damage(&self, amount: u32) -> u32 {
        let mut state = self.state.write();
        state.hp = state.hp.saturating_sub(amount);
        state.hp
    }
}

/// In-memory directory of characters, enumerated in insertion order.
#[derive(Debug, Default)]
pub struct CharacterDirectory {
    characters: DashMap<CharacterId, Arc<PlayerCharacter>>,
    order: RwLock<Vec<CharacterId>>,
    revival_prompts: Mutex<Vec<CharacterId>>,
}

impl CharacterDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a character, replacing any previous one with the same id.
    pub fn insert(&self, character: PlayerCharacter) -> Arc<PlayerCharacter> {
        let id = character.id;
        let character = Arc::new(character);
        if self
            .characters
            .insert(id, Arc::clone(&character))
            .is_none()
        {
            self.order.write().push(id);
        }
        character
    }

    /// Removes a character.
    pub fn remove(&self, id: CharacterId) -> Option<Arc<PlayerCharacter>> {
        let removed = self.characters.remove(&id).map(|(_, c)| c);
        if removed.is_some() {
            self.order.write().retain(|&other| other != id);
        }
        removed
    }

    /// Looks up a character.
    #[must_use]
    pub fn get(&self, id: CharacterId) -> Option<Arc<PlayerCharacter>> {
        self.characters.get(&id).map(|c| Arc::clone(c.value()))
    }

    /// Number of characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Returns true if no characters are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Revival prompts triggered so far, oldest first.
    #[must_use]
    pub fn revival_prompts(&self) -> Vec<CharacterId> {
        self.revival_prompts.lock().clone()
    }

    /// Characters on `map` whose Chebyshev distance to `center` is at most
    /// `radius`, in insertion order. The grid metric never undercuts
    /// Chebyshev, so this is a superset of any metric-radius query.
    fn candidates(&self, map: MapId, center: Cell, radius: u32) -> Vec<Arc<PlayerCharacter>> {
        let order = self.order.read().clone();
        order
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|c| c.map() == map && c.cell().chebyshev_to(center) <= radius)
            .collect()
    }
}

impl SessionDirectory for CharacterDirectory {
    fn resolve_character_session(&self, id: CharacterId) -> Option<SessionHandle> {
        self.get(id).map(|c| c as SessionHandle)
    }

    fn find_nearest_hostile(
        &self,
        map: MapId,
        origin: Cell,
        radius: u32,
        predicate: &dyn Fn(&dyn CharacterSession) -> bool,
    ) -> Option<SessionHandle> {
        self.candidates(map, origin, radius)
            .into_iter()
            .find(|c| predicate(c.as_ref()))
            .map(|c| c as SessionHandle)
    }

    fn list_characters_in_radius(
        &self,
        map: MapId,
        center: Cell,
        radius: u32,
    ) -> Vec<SessionHandle> {
        self.candidates(map, center, radius)
            .into_iter()
            .filter(|c| c.cell().distance_to(center) <= radius)
            .map(|c| c as SessionHandle)
            .collect()
    }

    fn trigger_revival_prompt(&self, id: CharacterId) {
        debug!("Revival prompt for {id}");
        self.revival_prompts.lock().push(id);
    }
}
