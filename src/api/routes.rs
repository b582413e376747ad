//! Route table for the client-facing HTTP surface (spec.md §6).

use crate::api::handlers::{retrieve, store, SharedDistributor};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(distributor: SharedDistributor) -> Router {
    Router::new()
        .route("/:fileref", post(store))
        .route("/:fileref", get(retrieve))
        .layer(TraceLayer::new_for_http())
        .with_state(distributor)
}
