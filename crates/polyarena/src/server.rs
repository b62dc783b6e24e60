//! `PolyarenaServer` builder and accept loop.
//!
//! This is the entry point for running a polyarena server. It ties
//! together all the layers: transport → protocol → room.

use std::sync::Arc;
use std::time::Duration;

use polyarena_protocol::JsonCodec;
use polyarena_room::{RoomConfig, RoomManager};
use polyarena_transport::{Transport, WebSocketTransport};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::PolyarenaError;
use crate::handler::handle_connection;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection liveness checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// How often the server pings an idle connection. Default: 5 seconds.
    pub interval: Duration,

    /// Intervals without any inbound traffic before the connection is
    /// closed. Default: 3.
    pub max_missed: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_missed: 3,
        }
    }
}

impl HeartbeatConfig {
    const MIN_INTERVAL: Duration = Duration::from_millis(100);

    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            tracing::warn!(
                requested_ms = self.interval.as_millis() as u64,
                "heartbeat interval too short, raising it"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.max_missed == 0 {
            tracing::warn!("heartbeat max_missed is 0, using 1");
            self.max_missed = 1;
        }
        self
    }
}

/// Everything needed to run a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Default: `127.0.0.1:8080`.
    pub bind_addr: String,

    /// How long a new connection has to send `join`. Default: 5 seconds.
    pub join_timeout: Duration,

    pub heartbeat: HeartbeatConfig,

    /// Applied to every room the server creates.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            join_timeout: Duration::from_secs(5),
            heartbeat: HeartbeatConfig::default(),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validated(mut self) -> Self {
        if self.join_timeout.is_zero() {
            tracing::warn!("join_timeout is zero, using the default");
            self.join_timeout = Self::default().join_timeout;
        }
        self.heartbeat = self.heartbeat.validated();
        self.room = self.room.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a polyarena server.
#[derive(Debug, Default)]
pub struct PolyarenaServerBuilder {
    config: ServerConfig,
}

impl PolyarenaServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.config.heartbeat = heartbeat;
        self
    }

    /// Binds the listener. Connections are not accepted until
    /// [`PolyarenaServer::run`].
    pub async fn build(self) -> Result<PolyarenaServer, PolyarenaError> {
        let config = self.config.validated();
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(config.room.clone())),
            codec: JsonCodec,
            config,
        });

        Ok(PolyarenaServer { transport, state })
    }
}

/// A bound polyarena server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PolyarenaServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl PolyarenaServer {
    pub fn builder() -> PolyarenaServerBuilder {
        PolyarenaServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop until the process is terminated, spawning a
    /// handler task per connection.
    pub async fn run(mut self) -> Result<(), PolyarenaError> {
        tracing::info!(addr = %self.state.config.bind_addr, "polyarena server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
