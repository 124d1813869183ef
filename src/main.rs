use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use isu_engine::{
    adding_cache::AddingCache, cli, config, errors::AppError, jobs, room_time::RoomTimeGate,
    routing, session,
    store::{GameStore, PgGameStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "isu_engine=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Initialize) => run_initialize(cfg).await,
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {e:?}");
    }
    result
}

async fn run_initialize(cfg: config::Config) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let store = PgGameStore::connect(&cfg.database_url).await?;
    tracing::info!("Resetting schema and running migrations...");
    store.reset_schema().await?;
    tracing::info!("Database reset successfully.");
    Ok(())
}

async fn run_server(cfg: config::Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);

    tracing::info!("Connecting to database...");
    let store = PgGameStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    store.migrate().await?;

    let cache = Arc::new(AddingCache::new());
    let snapshot_dir = PathBuf::from(&cfg.snapshot_dir);
    tracing::info!("Restoring adding cache snapshot from {:?}...", snapshot_dir);
    jobs::snapshot::restore(&cache, &snapshot_dir);
    jobs::snapshot::spawn(cache.clone(), snapshot_dir, cfg.snapshot_interval_secs);

    let state = Arc::new(AppState {
        store: Arc::new(store),
        cache,
        gate: Arc::new(RoomTimeGate::new()),
        config: cfg,
    });

    let app = axum::Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/room/:room_name", get(routing::room_handler))
        .route("/ws/:room_name", get(ws_game_handler))
        .route("/initialize", axum::routing::post(initialize_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("isu-engine listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_game_handler(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        session::serve(
            socket,
            room_name,
            state.store.clone(),
            state.cache.clone(),
            state.gate.clone(),
        )
        .await;
    })
}

/// `POST /initialize`: administrative reset, gated by an optional admin key.
async fn initialize_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<axum::http::StatusCode, AppError> {
    if let Some(expected) = state.config.admin_key() {
        let supplied = headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if supplied != expected {
            return Err(AppError::Unauthorized);
        }
    }

    state.store.initialize().await?;
    state.cache.clear();
    state.gate.clear();
    Ok(axum::http::StatusCode::NO_CONTENT)
}
