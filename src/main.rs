pub mod api;
pub mod db;
pub mod matchmaking;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Defaults to an in-memory DB so the server runs without any setup;
    // point DATABASE_URL at a file to keep the logs around.
    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    api::server::start_server(&db_url).await;
}
