//! Game Logic Module
//!
//! World state and the fixed-rate simulation. No I/O in here.
//!
//! ## Module Structure
//!
//! - `input`: Movement directions and the bitmask packing them
//! - `state`: Players and the world registry
//! - `pending`: Per-tick join/leave/ping window with collapsing
//! - `movement`: Position integration with wraparound
//! - `events`: Tick output addressed to recipients
//! - `tick`: Authoritative simulation step

pub mod input;
pub mod state;
pub mod pending;
pub mod movement;
pub mod events;
pub mod tick;

// Re-export key types
pub use input::{Direction, InvalidDirection, MoveMask};
pub use state::{Player, PlayerId, World, WorldError};
pub use pending::{LeaveOutcome, PendingEvents};
pub use tick::TickResult;
pub use events::{Audience, GameEvent, GameEventData};
