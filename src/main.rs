//! Arena Server
//!
//! Authoritative server for the shared arena.
//! Parses the command line, installs logging and serves until Ctrl+C.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use arena::{
    network::{GameServer, ServerConfig},
    DEFAULT_MAX_PLAYERS, DEFAULT_PORT, PLAYER_SPEED, TICK_RATE, VERSION, WORLD_HEIGHT,
    WORLD_WIDTH,
};

/// Command line arguments.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,
    /// Port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Maximum concurrent players
    #[clap(long, default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: usize,
    /// Maximum concurrent players from one IP address
    #[clap(long, default_value_t = 10)]
    max_per_ip: usize,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,
    /// Ticks between stats log lines, 0 to disable
    #[clap(long, default_value_t = 150)]
    stats_interval: u64,
    /// Seed for spawn positions and hues (random if omitted)
    #[clap(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            max_players: self.max_players,
            max_players_per_ip: self.max_per_ip,
            tick_rate: self.tick_rate,
            stats_interval: self.stats_interval,
            seed: self.seed.unwrap_or(defaults.seed),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = Args::parse().into_config();

    info!("Arena Server v{}", VERSION);
    info!(
        "World {}x{}, speed {} u/s, tick rate {} Hz, seed {}",
        WORLD_WIDTH, WORLD_HEIGHT, PLAYER_SPEED, config.tick_rate, config.seed
    );

    let server = Arc::new(GameServer::new(config).context("invalid configuration")?);

    let runner = Arc::clone(&server);
    let mut server_handle = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        result = &mut server_handle => {
            return match result {
                Ok(outcome) => outcome.context("server stopped"),
                Err(e) => Err(e).context("server task panicked"),
            };
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    server.shutdown();
    server_handle
        .await
        .context("server task panicked")?
        .context("server stopped with an error")?;

    Ok(())
}
