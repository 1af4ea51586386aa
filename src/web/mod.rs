use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    hub::Hub,
    scheduler::{spawn_tick_loop, spawn_traffic_loop},
    systems::standard_engine,
    traffic::TrafficSimulator,
    world::WorldSnapshot,
};

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub name: Option<String>,
}

pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/ws", get(join))
        .route("/api/state", get(latest_state))
        .route("/healthz", get(healthz))
        .with_state(hub)
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let hub = Arc::new(Hub::from_config(&config));

    // Traffic gets its own stream so that both cadences stay reproducible
    // from one configured seed.
    let engine = standard_engine(config.seed);
    let traffic = TrafficSimulator::new(
        config.traffic,
        config.timing.traffic_period(),
        config.seed.map(|seed| seed.wrapping_add(1)),
    );
    let tick_task = spawn_tick_loop(hub.clone(), engine, config.timing.tick_period());
    let traffic_task = spawn_traffic_loop(hub.clone(), traffic, config.timing.traffic_period());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, width = config.map.width, height = config.map.height, "citysim server listening");

    axum::serve(listener, router(hub))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tick_task.abort();
    traffic_task.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

async fn healthz() -> &'static str {
    "ok"
}

async fn latest_state(State(hub): State<Arc<Hub>>) -> Json<WorldSnapshot> {
    Json(hub.snapshot())
}

async fn join(
    State(hub): State<Arc<Hub>>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, hub, params.name))
}

async fn client_session(mut socket: WebSocket, hub: Arc<Hub>, name: Option<String>) {
    let mut session = match hub.connect(name.as_deref()) {
        Ok(session) => session,
        Err(err) => {
            warn!(%err, "failed to join player");
            return;
        }
    };

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        hub.handle_message(&session.player, text.as_str());
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
            outgoing = session.outbound.recv() => {
                // `None` means the publisher dropped this client.
                let Some(payload) = outgoing else {
                    break;
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.disconnect(&session);
}
