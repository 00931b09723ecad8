//! Network Layer
//!
//! WebSocket server, wire codec and connection bookkeeping.
//! All world decisions are made by `game/`; this layer only moves bytes
//! in and out at tick boundaries.

pub mod protocol;
pub mod registry;
pub mod stats;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, MessageKind, WireError, Hue};
pub use registry::{Arena, Admission, AdmissionError, Inbound, TickReport};
pub use stats::{ServerStats, StatsSnapshot, TickSample, TickWindow};
pub use server::{GameServer, ServerConfig, GameServerError};
