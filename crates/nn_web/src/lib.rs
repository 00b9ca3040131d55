use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/news", get(handlers::list_news))
        .route("/api/days", get(handlers::list_days))
        .route("/api/groups", get(handlers::list_groups))
        .route("/api/articles", post(handlers::ingest_articles))
        .route("/api/neutral", post(handlers::load_neutral))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> nn_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use nn_core::{Error, Result};
}
