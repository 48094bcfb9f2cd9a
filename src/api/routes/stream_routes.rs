//! Stream routes (e.g., /api/v1/stream/*)

use axum::{routing::get, Router};

use crate::api::controller::stream::StreamController;
use crate::app_state::AppState;

/// Build the router for stream endpoints under /api/v1/stream
pub fn stream_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(StreamController::list)
                .post(StreamController::reject_write)
                .put(StreamController::reject_write)
                .patch(StreamController::reject_write)
                .delete(StreamController::reject_write),
        )
        .route("/schema/", get(StreamController::schema))
        .route(
            "/{id}/",
            get(StreamController::detail)
                .post(StreamController::reject_write)
                .put(StreamController::reject_write)
                .patch(StreamController::reject_write)
                .delete(StreamController::reject_write),
        )
}
