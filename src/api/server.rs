use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{messages, ws};
use crate::db::repo;
use crate::matchmaking::service::Matchmaker;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub matchmaker: Matchmaker,
}

pub async fn start_server(db_url: &str) {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .expect("Failed to connect to SQLite");

    repo::init_schema(&pool)
        .await
        .expect("Failed to create log tables");

    let matchmaker = Matchmaker::new(pool.clone());

    let state = Arc::new(AppState {
        db: pool,
        matchmaker: matchmaker.clone(),
    });

    // Periodic queue/directory narration, alongside the per-event logs.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let stats = matchmaker.stats().await;
            tracing::debug!(
                connected = stats.connected,
                waiting = stats.waiting,
                active_chats = stats.active_chats,
                "matchmaking state"
            );
        }
    });

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/chat-message", post(messages::log_chat_message))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("Failed to bind port");

    tracing::info!(port, "server running");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed");
}
