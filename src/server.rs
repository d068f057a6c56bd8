//! Hub server
//!
//! Accepts CC frames from knob emitters on `/ws`, fans them out to
//! authenticated bridge clients on `/login`, and manages the exposed device
//! registry on `/devices`. Also serves the static frontend bundle.

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    handler::HandlerWithoutStateExt,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any_service, get, MethodRouter},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::devices::{Device, DeviceUpdate, ExposedDevices};
use crate::wire::{CcFrame, WireError};

/// Fan-out buffer per bridge subscriber
const BROADCAST_BUFFER: usize = 256;

/// Shared state for hub handlers
pub struct HubState {
    /// Shared password for /login and /devices
    password: String,
    /// Frame fan-out to bridge sessions
    frames_tx: broadcast::Sender<CcFrame>,
    /// Exposed device registry
    devices: parking_lot::RwLock<ExposedDevices>,
}

impl HubState {
    pub fn new(password: String) -> Self {
        let (frames_tx, _) = broadcast::channel(BROADCAST_BUFFER);
        Self {
            password,
            frames_tx,
            devices: parking_lot::RwLock::new(ExposedDevices::new()),
        }
    }

    /// Broadcast one frame to all bridge sessions (no subscribers is fine)
    pub fn publish(&self, frame: CcFrame) -> usize {
        self.frames_tx.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CcFrame> {
        self.frames_tx.subscribe()
    }

    fn check_password(&self, supplied: &str) -> bool {
        !self.password.is_empty() && supplied == self.password
    }
}

/// Password query parameter for protected routes
#[derive(Debug, Deserialize)]
struct AuthQuery {
    #[serde(default)]
    password: String,
}

/// API error response
#[derive(Debug, serde::Serialize)]
struct ApiError {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Decode a frame from an incoming WS message, either encoding
///
/// Returns `None` for messages that do not carry frames (ping/pong/close).
pub fn frame_from_message(msg: &Message) -> Option<Result<CcFrame, WireError>> {
    match msg {
        Message::Binary(data) => Some(CcFrame::parse(data)),
        Message::Text(text) => Some(CcFrame::parse_text(text)),
        _ => None,
    }
}

/// Build the hub router
pub fn build_router(state: Arc<HubState>, config: &AppConfig) -> Router {
    let cors = CorsLayer::new().allow_origin(Any);

    Router::new()
        .fallback(fallback)
        .nest_service("/static", serve_dir(&config.server.static_dir))
        .nest_service("/assets", serve_dir(&config.server.assets_dir))
        .route("/ws", get(emitter_ws))
        .route("/login", get(bridge_ws))
        .route("/devices", get(list_devices).post(update_devices))
        .route("/healthz", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Run the hub until `shutdown` resolves
pub async fn run(
    config: AppConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if config.server.password.is_empty() {
        warn!("No server password configured; /login and /devices will refuse all clients");
    }

    let state = Arc::new(HubState::new(config.server.password.clone()));
    let app = build_router(state, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Hub listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("Hub server failed")?;

    info!("Hub stopped");
    Ok(())
}

fn serve_dir(web_folder: &str) -> MethodRouter {
    async fn handle_404() -> (StatusCode, &'static str) {
        (StatusCode::NOT_FOUND, "Resource not found.")
    }

    any_service(ServeDir::new(web_folder).not_found_service(handle_404.into_service()))
}

async fn fallback(uri: Uri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("not found: {uri}"))
}

async fn health_check() -> &'static str {
    "ok"
}

/// GET /ws - knob emitter ingress
async fn emitter_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<HubState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_emitter(socket, addr, state))
}

async fn handle_emitter(mut socket: WebSocket, addr: SocketAddr, state: Arc<HubState>) {
    info!("Emitter connected: {}", addr);

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(msg) => msg,
        };

        match frame_from_message(&msg) {
            Some(Ok(frame)) => {
                let receivers = state.publish(frame);
                debug!("{} ← {} ({} bridge sessions)", frame, addr, receivers);
            }
            Some(Err(e)) => {
                // Bad frames are dropped, never fatal to the session
                warn!("Undecodable frame from {}: {}", addr, e);
            }
            None => {}
        }
    }

    info!("Emitter disconnected: {}", addr);
}

/// GET /login - authenticated bridge egress
async fn bridge_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(auth): Query<AuthQuery>,
    State(state): State<Arc<HubState>>,
) -> Response {
    if !state.check_password(&auth.password) {
        warn!("Bridge login refused for {}", addr);
        return ApiError {
            error: "bad password".to_string(),
        }
        .into_response();
    }

    ws.on_upgrade(move |socket| handle_bridge(socket, addr, state))
        .into_response()
}

async fn handle_bridge(socket: WebSocket, addr: SocketAddr, state: Arc<HubState>) {
    info!("Bridge connected: {}", addr);

    let mut frames = state.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if let Err(e) = sink.send(Message::Binary(frame.encode().to_vec())).await {
                        debug!("Bridge write to {} failed: {}", addr, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Stale CC values are worthless; newer ones follow anyway
                    warn!("Bridge {} lagged, skipped {} frames", addr, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("Bridge disconnected: {}", addr);
}

/// GET /devices - current registry snapshot
async fn list_devices(
    Query(auth): Query<AuthQuery>,
    State(state): State<Arc<HubState>>,
) -> Result<Json<Vec<Device>>, ApiError> {
    if !state.check_password(&auth.password) {
        return Err(ApiError {
            error: "bad password".to_string(),
        });
    }
    Ok(Json(state.devices.read().snapshot()))
}

/// POST /devices - apply one registry update, returns the resulting list
async fn update_devices(
    Query(auth): Query<AuthQuery>,
    State(state): State<Arc<HubState>>,
    Json(update): Json<DeviceUpdate>,
) -> Result<Json<Vec<Device>>, ApiError> {
    if !state.check_password(&auth.password) {
        return Err(ApiError {
            error: "bad password".to_string(),
        });
    }

    info!("Device registry update: {:?}", update);
    Ok(Json(state.devices.write().apply(update)))
}
