//! DragSync WebSocket Peer
//!
//! The remote end of a DragSync session. Clients connect to `ws://host:port`
//! and stream the position of their dragged point; the peer pushes the
//! current radius on connect and whenever it changes.
//!
//! ## Protocol
//!
//! ```json
//! { "x": 200, "y": 150 }   // client -> peer
//! { "radius": 50 }         // peer -> client
//! ```
//!
//! ## HTTP
//!
//! - `PUT /radius` with `{ "radius": 50 }` broadcasts a new radius
//! - `GET /radius` returns the current radius
//! - `GET /positions` lists the last position of every connected client
//! - `GET /health`

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "dragsync-server")]
#[command(about = "WebSocket peer for DragSync clients")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
    /// Radius pushed to clients until changed via PUT /radius
    #[arg(long, default_value_t = 30.0)]
    radius: f64,
}

/// Position reported by a client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub x: f64,
    pub y: f64,
}

/// Radius pushed to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusUpdate {
    pub radius: f64,
}

/// Last known position of one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPosition {
    pub peer_id: Uuid,
    pub x: f64,
    pub y: f64,
}

/// Shared application state
struct AppState {
    /// Current radius; every connection watches it.
    radius: watch::Sender<f64>,
    /// Last position per connection
    positions: DashMap<Uuid, PositionUpdate>,
}

impl AppState {
    fn new(radius: f64) -> Self {
        let (radius, _) = watch::channel(radius);
        Self {
            radius,
            positions: DashMap::new(),
        }
    }

    fn current_radius(&self) -> f64 {
        *self.radius.borrow()
    }

    /// Store a new radius and wake every connection.
    fn set_radius(&self, radius: f64) {
        self.radius.send_replace(radius);
    }

    fn record_position(&self, peer_id: Uuid, position: PositionUpdate) {
        self.positions.insert(peer_id, position);
    }

    fn forget(&self, peer_id: &Uuid) {
        self.positions.remove(peer_id);
    }

    fn snapshot(&self) -> Vec<PeerPosition> {
        self.positions
            .iter()
            .map(|entry| PeerPosition {
                peer_id: *entry.key(),
                x: entry.value().x,
                y: entry.value().y,
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dragsync_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new(args.radius));
    let app = router(state);

    info!("DragSync peer listening on {}", args.bind);
    info!("WebSocket endpoint: ws://{}", args.bind);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/radius", get(get_radius).put(put_radius))
        .route("/positions", get(positions))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn get_radius(State(state): State<Arc<AppState>>) -> Json<RadiusUpdate> {
    Json(RadiusUpdate {
        radius: state.current_radius(),
    })
}

async fn put_radius(
    State(state): State<Arc<AppState>>,
    Json(update): Json<RadiusUpdate>,
) -> Result<Json<RadiusUpdate>, (StatusCode, &'static str)> {
    if !update.radius.is_finite() || update.radius < 0.0 {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "radius must be a non-negative number"));
    }
    state.set_radius(update.radius);
    info!("Radius set to {}", update.radius);
    Ok(Json(update))
}

async fn positions(State(state): State<Arc<AppState>>) -> Json<Vec<PeerPosition>> {
    Json(state.snapshot())
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_radius(sender: &mut SplitSink<WebSocket, Message>, radius: f64) -> Result<(), axum::Error> {
    let json = serde_json::json!({ "radius": radius }).to_string();
    sender.send(Message::Text(json.into())).await
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut radius_rx = state.radius.subscribe();

    let initial = *radius_rx.borrow_and_update();
    if send_radius(&mut sender, initial).await.is_ok() {
        loop {
            tokio::select! {
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<PositionUpdate>(&text) {
                                Ok(position) => {
                                    debug!("Position from {}: ({}, {})", peer_id, position.x, position.y);
                                    state.record_position(peer_id, position);
                                }
                                Err(e) => {
                                    warn!("Invalid message from {}: {}", peer_id, e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {} // Ignore binary, ping, pong
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", peer_id, e);
                            break;
                        }
                    }
                }

                changed = radius_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let radius = *radius_rx.borrow_and_update();
                    if send_radius(&mut sender, radius).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    state.forget(&peer_id);
    info!("Connection closed: {}", peer_id);
}
