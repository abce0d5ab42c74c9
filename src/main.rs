use fakebuster_api::{
    AppState,
    config::{AppConfig, ConfigError, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{MediaSink, MediaState, S3MediaSink, UploadPolicy},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// StartupError
///
/// Anything that stops the process before it starts serving.
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

/// main
///
/// Initializes configuration, logging, the database, the media sink and the
/// HTTP server, in that order.
#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // 1. Configuration. Production refuses to start without its secrets.
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging. RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fakebuster_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database. Schema migrations run before the first request is accepted.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connected and migrated");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    // 4. Media sink (MinIO locally, Supabase Storage in production).
    let s3_sink = S3MediaSink::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
        &config.media_public_url,
        UploadPolicy::new(config.max_upload_bytes),
    );

    if config.env == Env::Local {
        s3_sink.ensure_bucket_exists().await;
    }

    let media = Arc::new(s3_sink) as MediaState;

    // 5. Router and server.
    let port = config.port;
    let app = create_router(AppState::new(repo, media, config));

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
