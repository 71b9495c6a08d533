//! L2 Feed - order-book ingestion daemon
//!
//! Streams level-2 snapshots from the configured WebSocket endpoint, logs book
//! analytics and serves health and Prometheus metrics over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::sync::{mpsc, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use l2_feed_core::{
    ChannelConsumer, Config, ConnectionStatus, FeedEvent, FeedMetrics, SessionHandle,
    StreamSession, WebSocketClient,
};

/// Latest feed observations, updated by the event drain
#[derive(Debug, Default)]
struct FeedState {
    status: Option<ConnectionStatus>,
    symbol: Option<String>,
    /// Local receive time of the latest snapshot
    last_snapshot_at: Option<DateTime<Utc>>,
    last_mid_price: Option<f64>,
    snapshots: u64,
}

/// Application state shared with the HTTP handlers
struct AppState {
    feed: RwLock<FeedState>,
    registry: Registry,
    session: SessionHandle,
    stale_after: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting L2 feed");

    let config = Config::load()?;
    info!(
        endpoint = %config.endpoint_url,
        max_reconnect_attempts = config.max_reconnect_attempts,
        "Configuration loaded"
    );

    let registry = Registry::new();
    let metrics = FeedMetrics::register(&registry)?;

    let (consumer, events) = ChannelConsumer::new();
    let transport = WebSocketClient::from_config(&config);
    let mut session =
        StreamSession::from_config(&config, transport, consumer).with_metrics(metrics);
    let handle = session.handle();

    let state = Arc::new(AppState {
        feed: RwLock::new(FeedState::default()),
        registry,
        session: handle.clone(),
        stale_after: config.idle_timeout() * 2,
    });

    // Start health check server
    let health_addr: SocketAddr = config.health_addr.parse()?;
    let health_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_addr, health_state).await {
            warn!(error = %e, "Health server error");
        }
    });

    tokio::spawn(drain_events(events, Arc::clone(&state)));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                handle.stop();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let final_state = session.run().await;
    let latency = session.latency().stats();
    info!(
        state = ?final_state,
        messages = latency.count,
        mean_ms = latency.mean_ms,
        p99_ms = latency.p99_ms,
        "L2 feed stopped"
    );

    Ok(())
}

/// Apply consumer events to the shared state in arrival order
async fn drain_events(mut events: mpsc::UnboundedReceiver<FeedEvent>, state: Arc<AppState>) {
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Snapshot(snapshot) => {
                let book = snapshot.view().metrics();
                debug!(
                    symbol = %snapshot.symbol(),
                    mid_price = book.mid_price,
                    spread_bps = book.spread_bps,
                    imbalance = ?book.imbalance,
                    bid_depth = book.bid_depth,
                    ask_depth = book.ask_depth,
                    volume_ratio = ?book.volume_ratio(),
                    "Book update"
                );
                if !book.is_healthy() {
                    warn!(
                        symbol = %snapshot.symbol(),
                        spread = book.spread,
                        "Book is one-sided or crossed"
                    );
                }

                let mut feed = state.feed.write().await;
                feed.symbol = Some(snapshot.symbol().to_string());
                feed.last_snapshot_at = Some(Utc::now());
                feed.last_mid_price = Some(book.mid_price);
                feed.snapshots += 1;
            }
            FeedEvent::Status(status) => {
                state.feed.write().await.status = Some(status);
            }
        }
    }
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/reconnect", post(reconnect))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let feed = state.feed.read().await;
    let now = Utc::now();

    let connected = matches!(feed.status, Some(ConnectionStatus::Connected));
    let stale = match feed.last_snapshot_at {
        Some(at) => (now - at).num_milliseconds() > state.stale_after.as_millis() as i64,
        None => true,
    };

    let code = if connected && !stale {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::json!({
        "status": if code == StatusCode::OK { "healthy" } else { "degraded" },
        "component": "l2-feed",
        "connection": feed.status.as_ref().map(ToString::to_string),
        "symbol": feed.symbol.clone(),
        "last_snapshot_at": feed.last_snapshot_at.map(|at| at.to_rfc3339()),
        "last_mid_price": feed.last_mid_price,
        "snapshots": feed.snapshots,
        "stale": stale,
        "timestamp": now.to_rfc3339(),
    });

    (code, Json(body))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        warn!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Reset the retry budget; restarts a terminated session
async fn reconnect(State(state): State<Arc<AppState>>) -> StatusCode {
    info!("Reconnect requested over HTTP");
    state.session.request_reconnect();
    StatusCode::ACCEPTED
}
