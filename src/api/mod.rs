//! API layer -- axum routes, handlers, and middleware.

mod error;
pub mod origin;
mod routes;
pub mod state;

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use self::error::ApiError;
use self::origin::OriginPolicy;
use self::state::AppState;

/// Build the application router with all API routes.
pub fn router(state: AppState, policy: OriginPolicy) -> Router {
    let cors = policy.cors_layer();
    Router::new()
        .merge(routes::api_routes())
        .fallback(fallback)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            Arc::new(policy),
            origin::origin_guard,
        ))
        .layer(TraceLayer::new_for_http())
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
