use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Depot endpoints.
///
/// Content uploads are streamed into the engine as they arrive and bounded
/// by the engine's quota. JSON bodies keep axum's default size limit.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/buckets", get(handler::list_buckets))
        .route("/v1/blobs", get(handler::list_blobs).put(handler::describe_new_blob))
        .route("/v1/blobs/search", post(handler::search_blobs))
        .route("/v1/blobs/byId/:id", get(handler::get_blob).delete(handler::delete_blob))
        .route(
            "/v1/blobs/byId/:id/content",
            get(handler::get_content)
                .put(handler::put_content)
                .patch(handler::insert_content),
        )
        .route("/v1/blobs/byId/:id/content/append", post(handler::append_content))
        .route("/v1/blobs/byId/:id/url", get(handler::content_url))
        .route("/static/:id", get(handler::get_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
