//! # Arena Server
//!
//! Authoritative server for a real-time multiplayer arena: clients connect
//! over WebSocket, hold movement keys, and every client sees the same
//! players moving around a wrapping world.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ARENA SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── vec2.rs     - 2D float vector with wraparound           │
//! │  └── rng.rs      - Seedable Xorshift128+ PRNG                │
//! │                                                              │
//! │  game/           - World simulation (no I/O)                 │
//! │  ├── input.rs    - Directions and movement bitmask           │
//! │  ├── state.rs    - Players and the world registry            │
//! │  ├── pending.rs  - Per-tick join/leave/ping window           │
//! │  ├── movement.rs - Position integration                      │
//! │  ├── events.rs   - Tick output addressed to recipients       │
//! │  └── tick.rs     - Authoritative simulation step             │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── protocol.rs - Fixed-layout binary records               │
//! │  ├── registry.rs - Connections, inboxes, fan-out             │
//! │  ├── stats.rs    - Operational counters                      │
//! │  └── server.rs   - WebSocket server and tick loop            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency Model
//!
//! Connection tasks only queue intents. One tick at a time drains those
//! queues, decides what everyone is told, and advances positions, so the
//! order of broadcasts inside a tick is fixed regardless of network timing.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use game::input::{Direction, MoveMask};
pub use game::state::{Player, PlayerId, World};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 30;

/// World width in world units
pub const WORLD_WIDTH: f32 = 800.0;

/// World height in world units
pub const WORLD_HEIGHT: f32 = 600.0;

/// Player hitbox size (clients only, not enforced here)
pub const PLAYER_SIZE: f32 = 30.0;

/// Movement speed in world units per second
pub const PLAYER_SPEED: f32 = 500.0;

/// Default listening port
pub const DEFAULT_PORT: u16 = 6970;

/// Default maximum concurrent players
pub const DEFAULT_MAX_PLAYERS: usize = 2000;
