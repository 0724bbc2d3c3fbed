//! # Horde Gameplay
//!
//! Monster behavior engine for Project Horde.
//!
//! This crate drives every spawned monster on a map, one tick at a time:
//! - Species catalog loaded from TOML
//! - Live instances with vitals, threat ledger, and skill cooldowns
//! - Identifier allocation above the monster floor
//! - Behavior state machine (dead, idle, pursuing, engaging)
//! - Idle wandering, pursuit with straight-line and jump point routing
//! - Skill rolls, cooldown-gated attacks, and splash damage
//! - Deferred continuations in place of sleeping
//! - Collaborator contracts (spatial, sessions, broadcast) with in-memory
//!   implementations
//! - Per-map roster that fans ticks out to worker threads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod allocator;
pub mod behavior;
pub mod broadcast;
pub mod combat;
pub mod config;
pub mod continuation;
pub mod grid;
pub mod instance;
pub mod movement;
pub mod roster;
pub mod session;
pub mod spatial;
pub mod template;

#[cfg(test)]
mod testing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::allocator::*;
    pub use crate::behavior::*;
    pub use crate::broadcast::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::continuation::*;
    pub use crate::grid::*;
    pub use crate::instance::*;
    pub use crate::roster::*;
    pub use crate::session::*;
    pub use crate::spatial::*;
    pub use crate::template::*;
}

pub use prelude::*;
