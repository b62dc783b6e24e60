//! Runs a polyarena server.
//!
//! ```text
//! RUST_LOG=polyarena_room=debug polyarena-server --bind 0.0.0.0:8080 --config arena.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use polyarena::prelude::*;
use tracing_subscriber::EnvFilter;

/// Server-authoritative multiplayer shape arena.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON file with a full or partial server configuration
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[clap(short, long)]
    bind: Option<String>,

    /// Players per room, counting those in their grace period
    #[clap(long)]
    max_players: Option<usize>,

    /// Replication ticks per second
    #[clap(short, long)]
    tick_rate: Option<u32>,

    /// Seconds a disconnected player may take to come back
    #[clap(long)]
    grace_secs: Option<u64>,
}

impl Args {
    /// The config file, if any, with command-line overrides applied.
    fn server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| format!("reading {}: {e}", path.display()))?;
                serde_json::from_str(&raw)
                    .map_err(|e| format!("parsing {}: {e}", path.display()))?
            }
            None => ServerConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.bind_addr = bind.clone();
        }
        if let Some(max_players) = self.max_players {
            config.room.max_players = max_players;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.room.tick_rate_hz = tick_rate;
        }
        if let Some(secs) = self.grace_secs {
            config.room.lifecycle.session.reconnect_grace = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().server_config()?;

    let server = PolyarenaServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run().await?;
    Ok(())
}
