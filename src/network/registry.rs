//! Connection Registry
//!
//! Binds live connections to players. The `Arena` owns the world plus one
//! handle per connection: an inbox of decoded intents the tick drains,
//! and an outbox of encoded records a writer task flushes to the socket.
//!
//! Connection tasks never touch player state. They push into their inbox
//! and, when the socket ends, drop it; the next tick applies whatever was
//! queued and then removes the player.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, info, warn};

use crate::game::events::{Audience, GameEvent};
use crate::game::input::Direction;
use crate::game::pending::LeaveOutcome;
use crate::game::state::{PlayerId, World, WorldError};
use crate::game::tick::{tick, TickResult};
use crate::network::protocol::{AmmaMoving, ClientMessage, Ping, ServerMessage};
use crate::network::server::ServerConfig;
use crate::network::stats::{ServerStats, StatsSnapshot, TickSample, TickWindow};

// =============================================================================
// TYPES
// =============================================================================

/// Why a connection was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// World is at capacity.
    #[error(transparent)]
    Capacity(#[from] WorldError),

    /// Too many players from one address.
    #[error("address {addr} already has {limit} players")]
    AddressLimit {
        /// Offending address
        addr: IpAddr,
        /// Configured per-address limit
        limit: usize,
    },
}

/// Decoded client intent waiting for the next tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Inbound {
    /// Start or stop moving in one direction.
    Moving {
        /// Direction
        direction: Direction,
        /// Start (true) or stop (false)
        start: bool,
    },
    /// Latency probe.
    Ping {
        /// Client timestamp to echo
        timestamp: f64,
    },
}

impl From<ClientMessage> for Inbound {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::AmmaMoving(AmmaMoving { direction, start }) => {
                Inbound::Moving { direction, start }
            }
            ClientMessage::Ping(Ping { timestamp }) => Inbound::Ping { timestamp },
        }
    }
}

/// Handed back to the connection task on successful admission.
#[derive(Debug)]
pub struct Admission {
    /// Assigned player id
    pub id: PlayerId,
    /// Where the connection task pushes decoded intents
    pub inbox: mpsc::Sender<Inbound>,
}

/// Registry-side half of a connection.
#[derive(Debug)]
struct Connection {
    addr: IpAddr,
    inbox: mpsc::Receiver<Inbound>,
    outbox: mpsc::Sender<Vec<u8>>,
}

/// Outcome of one tick, for logging and tests.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Tick number that just ran
    pub tick: u64,
    /// Simulation output
    pub result: TickResult,
    /// Cost of the tick
    pub sample: TickSample,
}

// =============================================================================
// ARENA
// =============================================================================

/// World plus the connections attached to it.
#[derive(Debug)]
pub struct Arena {
    world: World,
    connections: BTreeMap<PlayerId, Connection>,
    per_address: BTreeMap<IpAddr, usize>,
    handshaking: usize,
    max_per_address: usize,
    inbox_capacity: usize,
    dt: f32,
    tick: u64,
    stats: Arc<ServerStats>,
    window: TickWindow,
}

impl Arena {
    /// Create an empty arena from server configuration.
    pub fn new(config: &ServerConfig, stats: Arc<ServerStats>) -> Self {
        Self {
            world: World::new(config.max_players, config.seed),
            connections: BTreeMap::new(),
            per_address: BTreeMap::new(),
            handshaking: 0,
            max_per_address: config.max_players_per_ip,
            inbox_capacity: config.inbox_capacity.max(1),
            dt: config.tick_duration().as_secs_f32(),
            tick: 0,
            stats,
            window: TickWindow::default(),
        }
    }

    /// Check whether a connection from `addr` would be admitted right now.
    ///
    /// Reserved handshakes count against both the capacity and the
    /// per-address limit.
    pub fn can_admit(&self, addr: IpAddr) -> Result<(), AdmissionError> {
        if self.world.len() + self.handshaking >= self.world.capacity() {
            return Err(WorldError::CapacityReached {
                capacity: self.world.capacity(),
            }
            .into());
        }
        let current = self.per_address.get(&addr).copied().unwrap_or(0);
        if current >= self.max_per_address {
            return Err(AdmissionError::AddressLimit {
                addr,
                limit: self.max_per_address,
            });
        }
        Ok(())
    }

    /// Hold a slot for a connection whose handshake has not finished.
    ///
    /// Every successful reservation must end in either
    /// [`accept_reserved`](Self::accept_reserved) or [`release`](Self::release).
    pub fn reserve(&mut self, addr: IpAddr) -> Result<(), AdmissionError> {
        if let Err(e) = self.can_admit(addr) {
            self.stats.record_rejected();
            return Err(e);
        }
        self.handshaking += 1;
        *self.per_address.entry(addr).or_insert(0) += 1;
        Ok(())
    }

    /// Give back a slot held by [`reserve`](Self::reserve).
    pub fn release(&mut self, addr: IpAddr) {
        self.handshaking = self.handshaking.saturating_sub(1);
        self.forget_address(addr);
    }

    /// Turn a reservation into a player.
    pub fn accept_reserved(
        &mut self,
        addr: IpAddr,
        outbox: mpsc::Sender<Vec<u8>>,
    ) -> Result<Admission, AdmissionError> {
        self.release(addr);
        self.accept(addr, outbox)
    }

    /// Pending handshakes holding a slot.
    pub fn handshaking(&self) -> usize {
        self.handshaking
    }

    /// Admit a connection: allocate an id, spawn the player, record the join.
    ///
    /// `outbox` receives every record addressed to the new player.
    pub fn accept(
        &mut self,
        addr: IpAddr,
        outbox: mpsc::Sender<Vec<u8>>,
    ) -> Result<Admission, AdmissionError> {
        if let Err(e) = self.can_admit(addr) {
            self.stats.record_rejected();
            return Err(e);
        }
        let id = self.world.join()?;

        let (inbox_tx, inbox_rx) = mpsc::channel(self.inbox_capacity);
        self.connections.insert(
            id,
            Connection {
                addr,
                inbox: inbox_rx,
                outbox,
            },
        );
        *self.per_address.entry(addr).or_insert(0) += 1;

        self.stats.record_joined();
        self.stats.set_players(self.world.len());
        info!("Player {} joined from {} ({} online)", id, addr, self.world.len());

        Ok(Admission { id, inbox: inbox_tx })
    }

    /// Detach a connection and remove its player.
    ///
    /// Dropping the registry's handles closes the outbox, which ends the
    /// writer task, and the inbox, which stops the reader from queueing.
    pub fn remove(&mut self, id: PlayerId) -> Option<LeaveOutcome> {
        if let Some(conn) = self.connections.remove(&id) {
            self.forget_address(conn.addr);
        }

        let outcome = self.world.leave(id)?;
        self.stats.record_left();
        self.stats.set_players(self.world.len());
        info!("Player {} left ({} online)", id, self.world.len());

        Some(outcome)
    }

    fn forget_address(&mut self, addr: IpAddr) {
        if let Some(count) = self.per_address.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.per_address.remove(&addr);
            }
        }
    }

    /// Apply every queued intent, then remove connections whose task ended.
    pub fn drain_inboxes(&mut self) {
        let mut closed = Vec::new();

        for (&id, conn) in self.connections.iter_mut() {
            loop {
                match conn.inbox.try_recv() {
                    Ok(Inbound::Moving { direction, start }) => {
                        self.world.submit_intent(id, direction, start);
                    }
                    Ok(Inbound::Ping { timestamp }) => {
                        self.world.submit_ping(id, timestamp);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed.push(id);
                        break;
                    }
                }
            }
        }

        for id in closed {
            self.remove(id);
        }
    }

    /// Run one full tick: drain inboxes, simulate, fan out.
    pub fn run_tick(&mut self) -> TickReport {
        let started = Instant::now();
        let tick_number = self.tick;

        self.drain_inboxes();
        let result = tick(&mut self.world, tick_number, self.dt);

        let mut sample = TickSample::default();
        for event in &result.events {
            let (messages, bytes) = self.dispatch(event);
            sample.messages += messages;
            sample.bytes += bytes;
        }
        sample.duration = started.elapsed();

        self.tick += 1;
        self.window.push(sample);
        self.stats.record_tick();

        if !result.events.is_empty() {
            debug!(
                "Tick {}: {} events, {} records, {} bytes",
                tick_number,
                result.events.len(),
                sample.messages,
                sample.bytes
            );
        }

        TickReport {
            tick: tick_number,
            result,
            sample,
        }
    }

    /// Encode an event once and queue it for every recipient.
    ///
    /// Returns records and bytes queued. Full or closed outboxes drop the
    /// record; delivery is best effort.
    fn dispatch(&self, event: &GameEvent) -> (u64, u64) {
        let bytes = match ServerMessage::from(&event.data).encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode tick {} event: {}", event.tick, e);
                return (0, 0);
            }
        };
        let mut queued = 0u64;

        let mut deliver = |conn: &Connection| match conn.outbox.try_send(bytes.clone()) {
            Ok(()) => {
                self.stats.record_sent(bytes.len());
                queued += 1;
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.stats.record_dropped();
            }
        };

        match event.audience {
            Audience::Only(id) => {
                if let Some(conn) = self.connections.get(&id) {
                    deliver(conn);
                }
            }
            audience => {
                for (&id, conn) in &self.connections {
                    if audience.includes(id) {
                        deliver(conn);
                    }
                }
            }
        }

        (queued, queued * bytes.len() as u64)
    }

    /// The world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Connected players.
    pub fn len(&self) -> usize {
        self.world.len()
    }

    /// Check if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    /// Number of the next tick to run.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Shared counters.
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Counters plus rolling averages.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(&self.window)
    }

    /// Drop every connection. Used on shutdown.
    pub fn disconnect_all(&mut self) {
        let ids: Vec<PlayerId> = self.connections.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
