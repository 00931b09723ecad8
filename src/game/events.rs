//! Game Events
//!
//! Output of one tick: what must be told to whom.
//! The network layer turns each event into one wire record per recipient.

use crate::core::vec2::Vec2;
use crate::game::input::MoveMask;
use crate::game::state::{Player, PlayerId};

/// Who receives an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// A single connection
    Only(PlayerId),
    /// Every connection, the subject included
    Everyone,
    /// Every connection except one
    AllExcept(PlayerId),
}

impl Audience {
    /// Check if a given connection is part of this audience.
    #[inline]
    pub fn includes(self, id: PlayerId) -> bool {
        match self {
            Audience::Only(target) => target == id,
            Audience::Everyone => true,
            Audience::AllExcept(excluded) => excluded != id,
        }
    }
}

/// Game event data.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEventData {
    /// A joiner's own canonical state
    Hello {
        /// The joiner
        player_id: PlayerId,
        /// Spawn position
        position: Vec2,
        /// Hue in whole degrees
        hue: u16,
    },

    /// A player is (or already was) in the world
    PlayerJoined {
        /// Player being announced
        player_id: PlayerId,
        /// Position at the start of the tick
        position: Vec2,
        /// Hue in whole degrees
        hue: u16,
        /// Committed movement mask
        moving: MoveMask,
    },

    /// A player is gone
    PlayerLeft {
        /// Player that left
        player_id: PlayerId,
    },

    /// A player's committed movement changed
    PlayerMoving {
        /// Player that changed direction
        player_id: PlayerId,
        /// Position the new movement starts from
        position: Vec2,
        /// New committed movement mask
        moving: MoveMask,
    },

    /// Answer to a latency probe
    Pong {
        /// Client timestamp, echoed unchanged
        timestamp: f64,
    },
}

/// A game event addressed to an audience.
#[derive(Clone, Debug, PartialEq)]
pub struct GameEvent {
    /// Tick when the event was produced
    pub tick: u64,

    /// Recipients
    pub audience: Audience,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, audience: Audience, data: GameEventData) -> Self {
        Self {
            tick,
            audience,
            data,
        }
    }

    /// Greeting for a joiner, sent only to them.
    pub fn hello(tick: u64, player: &Player) -> Self {
        Self::new(
            tick,
            Audience::Only(player.id),
            GameEventData::Hello {
                player_id: player.id,
                position: player.position,
                hue: player.hue,
            },
        )
    }

    /// Join notice about `player`, addressed to `audience`.
    pub fn player_joined(tick: u64, audience: Audience, player: &Player) -> Self {
        Self::new(
            tick,
            audience,
            GameEventData::PlayerJoined {
                player_id: player.id,
                position: player.position,
                hue: player.hue,
                moving: player.moving,
            },
        )
    }

    /// Leave notice, broadcast to everyone left.
    pub fn player_left(tick: u64, player_id: PlayerId) -> Self {
        Self::new(
            tick,
            Audience::Everyone,
            GameEventData::PlayerLeft { player_id },
        )
    }

    /// Movement change, broadcast to everyone including the mover.
    pub fn player_moving(tick: u64, player: &Player) -> Self {
        Self::new(
            tick,
            Audience::Everyone,
            GameEventData::PlayerMoving {
                player_id: player.id,
                position: player.position,
                moving: player.moving,
            },
        )
    }

    /// Echo of a probe timestamp.
    pub fn pong(tick: u64, player_id: PlayerId, timestamp: f64) -> Self {
        Self::new(
            tick,
            Audience::Only(player_id),
            GameEventData::Pong { timestamp },
        )
    }
}
