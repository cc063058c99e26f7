use crate::config::Config;
use crate::rate_limit;
use crate::streaming::{start_cleanup_task, StreamEngine};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod error;
pub mod request_id;
pub mod routes_video;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub engine: Arc<StreamEngine>,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers([header::RANGE, header::AUTHORIZATION])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ]);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/video/:name", get(routes_video::stream_video))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            app = app.fallback_service(ServeDir::new(&dir).append_index_html_on_directories(true));
        } else {
            tracing::warn!("Static directory does not exist: {:?}", dir);
        }
    }

    app
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server on the configured address and run until
/// Ctrl+C or SIGTERM.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Starting server on {}", addr);
    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `signal` resolves.
///
/// On shutdown, pending throttle waits are aborted and the session and rate
/// limiter cleanup tasks (if any) are stopped before returning.
pub async fn serve<F>(listener: TcpListener, config: Config, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = CancellationToken::new();
    let engine = Arc::new(StreamEngine::from_config(&config, shutdown.clone()));

    let cleanup_interval = Duration::from_secs(config.sessions.cleanup_interval_secs.max(1));
    let mut cleanup = Vec::new();
    if let Some(ttl) = config.sessions.ttl_secs {
        tracing::info!(ttl_secs = ttl, "Session expiry enabled");
        cleanup.push(start_cleanup_task(
            Arc::clone(engine.sessions()),
            cleanup_interval,
            shutdown.clone(),
        ));
    }
    if let Some(limiter) = engine.limiter() {
        tracing::info!(
            requests_per_minute = config.rate_limit.requests_per_minute,
            "Per-client rate limiting enabled"
        );
        cleanup.push(rate_limit::start_cleanup_task(
            Arc::clone(limiter),
            cleanup_interval,
            shutdown.clone(),
        ));
    }

    tracing::info!(
        video_root = %config.server.video_root.display(),
        auth_required = config.auth.required,
        delay_ms_per_second_jump = config.throttle.delay_ms_per_second_jump,
        max_delay_ms = config.throttle.max_delay_ms,
        "Video streaming enabled"
    );

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext {
        config: Arc::new(config),
        engine,
    };
    let app = create_router(ctx, static_dir);

    let token = shutdown.clone();
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        signal.await;
        token.cancel();
    })
    .await;

    shutdown.cancel();
    for handle in cleanup {
        if let Err(e) = handle.await {
            tracing::warn!("Cleanup task failed: {}", e);
        }
    }

    result?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
