//! WebSocket Game Server
//!
//! Async WebSocket server for the shared arena.
//! Accepts connections, turns binary frames into intents for the arena,
//! and runs the fixed-rate tick that fans results back out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::network::protocol::{ClientMessage, WireError};
use crate::network::registry::{Admission, Arena};
use crate::network::stats::{ServerStats, StatsSnapshot};
use crate::{DEFAULT_MAX_PLAYERS, DEFAULT_PORT, TICK_RATE};

/// How long a reserved slot waits for the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent players.
    pub max_players: usize,
    /// Maximum concurrent players from one IP address.
    pub max_players_per_ip: usize,
    /// Tick rate for the simulation (Hz).
    pub tick_rate: u32,
    /// Queued intents per connection before its reader waits.
    pub inbox_capacity: usize,
    /// Queued outbound records per connection before records are dropped.
    pub outbox_capacity: usize,
    /// Ticks between stats log lines (0 disables them).
    pub stats_interval: u64,
    /// Seed for spawn positions and hues.
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_players: DEFAULT_MAX_PLAYERS,
            max_players_per_ip: 10,
            tick_rate: TICK_RATE,
            inbox_capacity: 64,
            outbox_capacity: 1024,
            stats_interval: 150,
            seed: rand::random(),
        }
    }
}

impl ServerConfig {
    /// Fixed duration of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), GameServerError> {
        if self.tick_rate == 0 {
            return Err(GameServerError::InvalidConfig(
                "tick rate must be positive".to_string(),
            ));
        }
        if self.max_players == 0 {
            return Err(GameServerError::InvalidConfig(
                "max players must be positive".to_string(),
            ));
        }
        if self.outbox_capacity == 0 {
            return Err(GameServerError::InvalidConfig(
                "outbox capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Unusable configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// World and connections.
    arena: Arc<Mutex<Arena>>,
    /// Counters shared with connection tasks.
    stats: Arc<ServerStats>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Result<Self, GameServerError> {
        config.validate()?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let stats = Arc::new(ServerStats::new());
        let arena = Arena::new(&config, stats.clone());

        Ok(Self {
            config,
            arena: Arc::new(Mutex::new(arena)),
            stats,
            shutdown_tx,
        })
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GameServerError> {
        Ok(TcpListener::bind(&self.config.bind_addr).await?)
    }

    /// Run the server on the configured address until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the server on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let local_addr = listener.local_addr()?;
        info!(
            "Arena server listening on {} ({} Hz, capacity {})",
            local_addr, self.config.tick_rate, self.config.max_players
        );

        let tick_handle = tokio::spawn(Self::run_tick_loop(
            self.arena.clone(),
            self.config.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            // Full arena: drop the TCP stream before any handshake bytes
                            let reserved = self.arena.lock().await.reserve(addr.ip());
                            if let Err(e) = reserved {
                                warn!("Rejecting {}: {}", addr, e);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Err(e) = tick_handle.await {
            error!("Tick loop failed: {}", e);
        }
        self.arena.lock().await.disconnect_all();
        info!("Arena server stopped");

        Ok(())
    }

    /// Handle a new WebSocket connection holding a reserved slot.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let arena = self.arena.clone();
        let stats = self.stats.clone();
        let outbox_capacity = self.config.outbox_capacity;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match timeout(HANDSHAKE_TIMEOUT, accept_async(stream)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    stats.record_bogus();
                    warn!("Protocol violation from {} during handshake: {}", addr, e);
                    arena.lock().await.release(addr.ip());
                    return;
                }
                Err(_) => {
                    debug!("Handshake from {} timed out", addr);
                    arena.lock().await.release(addr.ip());
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(outbox_capacity);

            let admitted = arena.lock().await.accept_reserved(addr.ip(), out_tx);
            let Admission { id, inbox } = match admitted {
                Ok(admission) => admission,
                Err(e) => {
                    warn!("Rejecting {} after handshake: {}", addr, e);
                    let _ = ws_sender.close().await;
                    return;
                }
            };

            // Spawn record writer task
            let writer = tokio::spawn(async move {
                while let Some(bytes) = out_rx.recv().await {
                    if ws_sender.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Handle incoming frames
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Binary(data))) => {
                                stats.record_received(data.len());
                                let client_msg = match ClientMessage::decode(&data) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        stats.record_bogus();
                                        warn!("Protocol violation from player {}: {}", id, e);
                                        break;
                                    }
                                };

                                #[cfg(feature = "debug-tracing")]
                                debug!("Player {} sent {:?}", id, client_msg);

                                if inbox.send(client_msg.into()).await.is_err() {
                                    // Already removed by the arena
                                    break;
                                }
                            }
                            Some(Ok(Message::Text(text))) => {
                                stats.record_received(text.len());
                                stats.record_bogus();
                                warn!("Protocol violation from player {}: {}", id, WireError::TextFrame);
                                break;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Player {} disconnected", id);
                                break;
                            }
                            Some(Err(e)) => {
                                debug!("WebSocket error for player {}: {}", id, e);
                                break;
                            }
                            // Ping/pong control frames are answered by tungstenite
                            Some(Ok(_)) => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Closing the inbox is the disconnect signal for the next tick
            drop(inbox);
            writer.abort();
        });
    }

    /// Run the fixed-rate tick loop.
    async fn run_tick_loop(
        arena: Arc<Mutex<Arena>>,
        config: ServerConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut tick_interval = interval(config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let mut arena = arena.lock().await;
                    let report = arena.run_tick();

                    if config.stats_interval > 0 && (report.tick + 1) % config.stats_interval == 0 {
                        log_stats(&arena.snapshot());
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get connected player count.
    pub async fn player_count(&self) -> usize {
        self.arena.lock().await.len()
    }

    /// Get a stats snapshot.
    pub async fn stats(&self) -> StatsSnapshot {
        self.arena.lock().await.snapshot()
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn log_stats(snapshot: &StatsSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => info!(target: "arena::stats", "{}", json),
        Err(e) => warn!("Failed to serialize stats: {}", e),
    }
}
