use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all object store endpoints.
///
/// `GET` routes also answer `HEAD`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handler::health))
        .route("/objects", post(handler::put_object))
        .route("/objects/*id", get(handler::get_object))
        .route(
            "/:bucket/*key",
            put(handler::put_named)
                .get(handler::get_named)
                .delete(handler::delete_named),
        )
        .fallback(handler::invalid_path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
