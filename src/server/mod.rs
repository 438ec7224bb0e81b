//! The relay endpoint: `POST /api/chat` validates a playground request and
//! streams the hosted generation capability's events back as SSE.

pub mod backend;
pub mod bot;
pub mod chat;
pub mod schema;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::server::backend::GenerationBackend;
use crate::server::bot::BotDetector;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn GenerationBackend>,
    pub bots: Arc<dyn BotDetector>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat::chat))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "chat relay listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
