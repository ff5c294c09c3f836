//! Lectern API Gateway
//!
//! The HTTP entry point for the teaching-assistant backend.
//! Handles:
//! - Access-token authentication
//! - Request routing for chat and lesson generation
//! - Server-sent event streaming
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use lectern_common::{
    config::AppConfig,
    context::ContextManager,
    embeddings::create_embedder,
    generation::create_generator,
    index::{HttpPassageIndex, PassageIndex},
    metrics,
    orchestrator::Orchestrator,
    retrieval::Retriever,
    store::{DocumentStore, FileDocumentStore},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn DocumentStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    let level: Level = config
        .observability
        .log_level
        .parse()
        .unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Lectern API Gateway v{}", lectern_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr =
            SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter on {}", metrics_addr);
    }

    // Wire the pipeline
    let embedder = create_embedder(&config.embedding)?;
    let index: Arc<dyn PassageIndex> = Arc::new(HttpPassageIndex::new(
        config.index.url.clone(),
        config.index.collection.clone(),
        config.index.timeout_secs,
    )?);
    let store: Arc<dyn DocumentStore> =
        Arc::new(FileDocumentStore::new(&config.store.directory));
    let retriever = Retriever::new(embedder, index, store.clone());

    let generator = create_generator(&config.generation)?;
    let context_manager = ContextManager::new(
        generator.clone(),
        config.history.max_turns,
        config.rewrite_timeout(),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        context_manager,
        retriever,
        generator,
        config.retrieval.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        orchestrator,
        store,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Health endpoints (no auth)
    let open_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    // API routes (access token required)
    let api_routes = Router::new()
        // Chat endpoints
        .route("/chat/stream", post(handlers::chat::stream))
        .route("/chat/send", post(handlers::chat::send))
        // Lesson endpoints
        .route("/lesson/stream", post(handlers::lesson::stream))
        .route("/lesson/generate", post(handlers::lesson::generate))
        // Source document click-through
        .route("/files/source/{filename}", get(handlers::files::source))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_access_token,
        ));

    // Compose the app
    Router::new()
        .merge(open_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
