use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream;
use crate::state::AppState;
use std::sync::Arc;

/// Create the WebSocket router
///
/// The telephony provider opens `/call/connection` once per call. The
/// endpoint is unauthenticated; restrict it at the network edge.
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/call/connection", get(media_stream::media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
