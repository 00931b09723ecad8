//! World State
//!
//! The authoritative registry of players plus the scratch state of the
//! current tick window. Uses BTreeMap so every broadcast walks players
//! in id order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::input::{Direction, MoveMask};
use crate::game::pending::{LeaveOutcome, PendingEvents};
use crate::{WORLD_HEIGHT, WORLD_WIDTH};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier.
///
/// Assigned monotonically from 0 and never reused within a process.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Authoritative state of one connected player.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Unique id
    pub id: PlayerId,
    /// Position, always inside the world rectangle after a tick
    pub position: Vec2,
    /// Hue in whole degrees (0-359), fixed at spawn
    pub hue: u16,
    /// Committed movement state, the one others see
    pub moving: MoveMask,
    /// Latest intent from the owning connection, committed next tick
    pub pending: MoveMask,
}

impl Player {
    /// Create a standing player.
    pub fn new(id: PlayerId, position: Vec2, hue: u16) -> Self {
        Self {
            id,
            position,
            hue,
            moving: MoveMask::NONE,
            pending: MoveMask::NONE,
        }
    }

    /// Check if the intent differs from the committed movement.
    #[inline]
    pub fn has_pending_change(&self) -> bool {
        self.pending != self.moving
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// Errors raised by world mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The world already holds its maximum population.
    #[error("world is full ({capacity} players)")]
    CapacityReached {
        /// Configured capacity
        capacity: usize,
    },
}

/// The single shared world.
#[derive(Clone, Debug)]
pub struct World {
    players: BTreeMap<PlayerId, Player>,
    next_id: u32,
    capacity: usize,
    rng: DeterministicRng,
    pending: PendingEvents,
}

impl World {
    /// Create an empty world.
    ///
    /// The seed drives spawn positions and hues.
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            players: BTreeMap::new(),
            next_id: 0,
            capacity,
            rng: DeterministicRng::new(seed),
            pending: PendingEvents::new(),
        }
    }

    /// Spawn a new player and record the join for the next tick.
    ///
    /// Fails without consuming an id when the world is full.
    pub fn join(&mut self) -> Result<PlayerId, WorldError> {
        if self.is_full() {
            return Err(WorldError::CapacityReached {
                capacity: self.capacity,
            });
        }

        let id = PlayerId(self.next_id);
        self.next_id += 1;

        let position = self.rng.random_position(WORLD_WIDTH, WORLD_HEIGHT);
        let hue = self.rng.random_hue();
        self.players.insert(id, Player::new(id, position, hue));
        self.pending.record_join(id);

        Ok(id)
    }

    /// Set or clear one direction of a player's intent.
    ///
    /// Nothing is broadcast until the next tick. Returns false if the
    /// player is gone.
    pub fn submit_intent(&mut self, id: PlayerId, direction: Direction, start: bool) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.pending.set(direction, start);
                true
            }
            None => false,
        }
    }

    /// Record a latency probe, replacing any earlier one from this tick.
    ///
    /// Returns false if the player is gone.
    pub fn submit_ping(&mut self, id: PlayerId, timestamp: f64) -> bool {
        if !self.players.contains_key(&id) {
            return false;
        }
        self.pending.record_ping(id, timestamp);
        true
    }

    /// Remove a player.
    ///
    /// Returns `None` if the player was already gone.
    pub fn leave(&mut self, id: PlayerId) -> Option<LeaveOutcome> {
        self.players.remove(&id)?;
        Some(self.pending.record_leave(id))
    }

    /// Get a player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Check if a player exists.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Iterate players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Current population.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if no one is connected.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Maximum population.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if another player would exceed the capacity.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    /// Id the next joiner will receive.
    pub fn next_id(&self) -> PlayerId {
        PlayerId(self.next_id)
    }

    /// Scratch state of the current tick window.
    pub fn pending(&self) -> &PendingEvents {
        &self.pending
    }

    /// Hand the current tick window to the caller and start a fresh one.
    pub(crate) fn take_pending(&mut self) -> PendingEvents {
        self.pending.take()
    }
}

// =============================================================================
// TESTS
// =============================================================================
