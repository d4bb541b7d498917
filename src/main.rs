use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use tableline::config::AppConfig;
use tableline::db;
use tableline::handlers;
use tableline::services::store::sqlite::SqliteStore;
use tableline::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let store = SqliteStore::new(Arc::new(Mutex::new(conn)));

    let state = Arc::new(AppState {
        store: Box::new(store),
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/voice", post(handlers::voice::incoming_call))
        .route("/webhook/speech", post(handlers::voice::speech))
        .route("/webhook/status", post(handlers::voice::call_status))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
