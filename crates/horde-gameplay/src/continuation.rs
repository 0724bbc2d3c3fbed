//! Deferred continuations.
//!
//! Work that has to happen "later" (a position update once travel finishes,
//! a hit that lands after a cast, a revival prompt) is stored on the instance
//! as a value with a due time and applied when the instance is next settled.
//! Nothing sleeps.

use horde_common::{Cell, CharacterId, Timestamp};

/// A hit waiting for its cast or stand-up delay to elapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikePlan {
    /// Character the hit is aimed at
    pub target: CharacterId,
    /// Index into the template's skills, `None` for the basic attack
    pub skill: Option<usize>,
}

/// Deferred work attached to a monster instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Commit the instance's position once travel is over.
    Relocate {
        /// Destination cell
        to: Cell,
    },
    /// Land a hit.
    Strike(StrikePlan),
    /// Ask a dead character whether to revive.
    PromptRevival {
        /// The dead character
        character: CharacterId,
    },
}

impl Continuation {
    /// Returns true for strikes.
    #[must_use]
    pub const fn is_strike(&self) -> bool {
        matches!(self, Self::Strike(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: Timestamp,
    seq: u64,
    action: Continuation,
}

/// Per-instance queue of continuations, applied in due order.
#[derive(Debug, Default)]
pub struct ContinuationQueue {
    entries: Vec<Scheduled>,
    next_seq: u64,
}

impl ContinuationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an action at `due`.
    pub fn schedule(&mut self, due: Timestamp, action: Continuation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Scheduled { due, seq, action });
    }

    /// Removes and returns every action due at or before `now`, earliest first.
    /// Actions due at the same instant keep scheduling order.
    pub fn take_due(&mut self, now: Timestamp) -> Vec<Continuation> {
        if !self.entries.iter().any(|e| e.due <= now) {
            return Vec::new();
        }

        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|e| e.due <= now);
        self.entries = pending;

        due.sort_by_key(|e| (e.due, e.seq));
        due.into_iter().map(|e| e.action).collect()
    }

    /// Returns true if a strike is waiting to land.
    #[must_use]
    pub fn has_strike(&self) -> bool {
        self.entries.iter().any(|e| e.action.is_strike())
    }

    /// Drops pending strikes.
    pub fn cancel_strikes(&mut self) {
        self.entries.retain(|e| !e.action.is_strike());
    }

    /// Returns true if a revival prompt is queued.
    #[must_use]
    pub fn has_revival(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.action, Continuation::PromptRevival { .. }))
    }

    /// Removes queued revival prompts, earliest first, and returns their
    /// characters.
    pub fn take_revivals(&mut self) -> Vec<CharacterId> {
        let (mut revivals, rest): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| matches!(e.action, Continuation::PromptRevival { .. }));
        self.entries = rest;

        revivals.sort_by_key(|e| (e.due, e.seq));
        revivals
            .into_iter()
            .filter_map(|e| match e.action {
                Continuation::PromptRevival { character } => Some(character),
                _ => None,
            })
            .collect()
    }

    /// Keeps only revival prompts.
    pub fn retain_revivals(&mut self) {
        self.entries
            .retain(|e| matches!(e.action, Continuation::PromptRevival { .. }));
    }

    /// Destination of the latest queued relocation.
    #[must_use]
    pub fn last_relocation(&self) -> Option<Cell> {
        self.entries
            .iter()
            .filter_map(|e| match e.action {
                Continuation::Relocate { to } => Some((e.due, e.seq, to)),
                _ => None,
            })
            .max_by_key(|(due, seq, _)| (*due, *seq))
            .map(|(_, _, to)| to)
    }

    /// Earliest due time, if anything is queued.
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
