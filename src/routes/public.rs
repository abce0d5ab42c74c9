use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a credential: the service banner, the health
/// probe, and read access to news.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        .route("/", get(handlers::root))
        // GET /health
        // Liveness probe for load balancers. Returns "ok" without touching the store.
        .route("/health", get(|| async { "ok" }))
        // GET /news?page=&limit=&category=&status=&search=
        // Newest-first listing with filters and page metadata.
        .route("/news", get(handlers::list_news))
        // GET /news/{id}
        // A single record with its author's username.
        .route("/news/{id}", get(handlers::get_news))
}
