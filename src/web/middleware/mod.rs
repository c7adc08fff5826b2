//! # Web API Middleware

pub mod request_id;

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::web::state::AppState;

/// Request ID generation (outermost), then request tracing.
pub fn apply_middleware_stack(router: Router<AppState>) -> Router<AppState> {
    router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::add_request_id))
}
