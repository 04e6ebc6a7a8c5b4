//! Cross-origin policy: an allow-list guard plus matching CORS headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// Origin admitted when no allow-list is configured: the local dashboard.
pub const DEV_DASHBOARD_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(origins: &[String]) -> Self {
        let allowed = if origins.is_empty() {
            vec![DEV_DASHBOARD_ORIGIN.to_string()]
        } else {
            origins.to_vec()
        };
        Self { allowed }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.iter().any(|o| o == origin)
    }

    /// CORS headers for the allowed origins.
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unrepresentable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

/// Reject requests from origins outside the allow-list.
///
/// Requests without an `Origin` header (curl, health checks, other services)
/// are always let through.
pub async fn origin_guard(
    State(policy): State<Arc<OriginPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
        if !policy.allows(&origin) {
            warn!(%origin, method = %req.method(), path = %req.uri().path(), "blocked cross-origin request");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": format!("origin not allowed: {origin}") })),
            )
                .into_response();
        }
    }
    next.run(req).await
}
