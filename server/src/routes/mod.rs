use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::create_cors_layer;
use crate::handlers::{
    create_event, delete_event, get_event, handle_panic, health_check, list_events, not_found,
    update_event,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check).fallback(not_found))
        .route(
            "/api/events",
            get(list_events).post(create_event).fallback(not_found),
        )
        .route(
            "/api/events/:id",
            get(get_event)
                .put(update_event)
                .delete(delete_event)
                .fallback(not_found),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(create_cors_layer()),
        )
}
