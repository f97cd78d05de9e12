pub mod api;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Every route the server exposes, with unmatched paths answered as JSON 404s
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::create_api_router())
        .merge(ws::create_ws_router())
        .fallback(crate::handlers::api::not_found)
        .with_state(state)
}
