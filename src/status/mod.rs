use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::engine::SessionStatus;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub status_rx: watch::Receiver<SessionStatus>,
    pub store: Store,
}

/// Build the Axum router for the read-only status surface.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/bets", get(bets_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /status
async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status_rx.borrow().clone();
    Json(status)
}

/// GET /bets
async fn bets_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .store
        .recent_bets(50)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
