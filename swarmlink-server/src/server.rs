//! Shared server state, the HTTP/WebSocket router, and the listener.
//!
//! The signaling endpoint is the root path: a GET upgrades to WebSocket and
//! hands the socket to the connection handler. A small read-only health
//! endpoint rides alongside it. Origin policy is permissive — peers connect
//! from whatever page embeds the client.

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::pieces::{PieceCatalog, PieceIndex};
use crate::registry::PeerRegistry;
use crate::router as dispatch;
use crate::swarm::SwarmIndex;

/// Process-wide state, instantiated once at startup and handed to every
/// connection task. All cross-peer interaction goes through here.
pub struct AppState {
    pub registry: PeerRegistry,
    pub swarms: SwarmIndex,
    pub pieces: PieceIndex,
    pub catalog: PieceCatalog,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: PeerRegistry::new(),
            swarms: SwarmIndex::new(),
            pieces: PieceIndex::new(),
            catalog: PieceCatalog::new(),
            config,
        }
    }
}

/// Build the axum router: WebSocket signaling at `/`, health at
/// `/api/v1/health`. Public so the integration suite can serve it on an
/// ephemeral port.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/api/v1/health", get(api_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| dispatch::handle_socket(socket, state))
}

#[derive(Serialize)]
struct HealthResponse {
    connections: usize,
    swarms: usize,
    uptime_secs: u64,
}

/// Server start time (set once on first call).
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(SystemTime::now);
    Json(HealthResponse {
        connections: state.registry.len(),
        swarms: state.swarms.len(),
        uptime_secs: start.elapsed().unwrap_or_default().as_secs(),
    })
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind and serve forever. Failure to bind is fatal.
    pub async fn run(self) -> Result<()> {
        let addr = ("127.0.0.1", self.config.port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind 127.0.0.1:{}", self.config.port))?;
        tracing::info!("Signaling listener on {}", listener.local_addr()?);

        let state = Arc::new(AppState::new(self.config));
        axum::serve(listener, router(state))
            .await
            .context("server terminated")
    }
}
