use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod service;
pub mod storage;

// Routing split by access level (public, authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use service::NewsService;
pub use storage::{MediaState, MockMediaSink, S3MediaSink};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`
/// with the Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::list_news, handlers::get_news,
        handlers::create_news, handlers::update_news, handlers::delete_news
    ),
    components(
        schemas(
            models::NewsItem, models::NewsView, models::NewsPage, models::AuthorSummary,
            models::CreateNewsRequest, models::UpdateNewsRequest, models::MessageResponse,
            models::SourcePlatform, models::Category, models::Assessment,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "fakebuster", description = "FakeBuster news API")
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme referenced by the write routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single shared container handed to every request: the News Store, the
/// Media Sink, the service built over both, and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub media: MediaState,
    pub news: NewsService,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state and the `NewsService` over the same store and sink.
    pub fn new(repo: RepositoryState, media: MediaState, config: AppConfig) -> Self {
        let news = NewsService::new(repo.clone(), media.clone());
        Self {
            repo,
            media,
            news,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MediaState {
    fn from_ref(app_state: &AppState) -> MediaState {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for `authenticated_routes`. A failed `AuthUser` extraction rejects the
/// request with 401 before any body is read; on success the identity is kept
/// in the request extensions so the handler does not verify it twice.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// cors_layer
///
/// Allow-list of browser origins from `CORS_ORIGINS`. Credentials are allowed,
/// so the origin list must stay explicit. Unparseable entries and `*` are
/// skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter(|origin| {
            if origin.as_str() == "*" {
                tracing::warn!("ignoring wildcard CORS origin, credentials are allowed");
                return false;
            }
            true
        })
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// create_router
///
/// Assembles the routing structure, applies the scoped and global middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let max_upload_bytes = state.config.max_upload_bytes;

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes(max_upload_bytes).route_layer(
                middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Span for `TraceLayer` carrying the request id, so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
