use axum::{routing::get, routing::post, Router};
use explain_jobs::{
    app_state::AppState,
    config::AppConfig,
    db::{self, queries::PgJobStore},
    routes,
    services::{orchestrator::Orchestrator, queue::JobQueue, storage::R2Client},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing explain-jobs API server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "explain_jobs_submitted_total",
        "Explainability jobs accepted for processing"
    );
    metrics::describe_counter!(
        "explain_jobs_completed_total",
        "Jobs reconciled to completed"
    );
    metrics::describe_counter!(
        "explain_jobs_failed_total",
        "Jobs reconciled to failed"
    );
    metrics::describe_counter!(
        "explain_reconcile_total",
        "Status polls answered, by reported status"
    );
    metrics::describe_gauge!(
        "explain_queue_depth",
        "Dispatched worker runs not yet picked up"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize R2 artifact store
    tracing::info!("Initializing R2 artifact store");
    let r2_client = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 client");

    // Initialize Redis dispatch queue
    tracing::info!("Connecting to Redis dispatch queue");
    let queue = Arc::new(JobQueue::new(&config.redis_url).expect("Failed to initialize job queue"));

    let orchestrator = Orchestrator::new(
        Arc::new(r2_client),
        Arc::new(PgJobStore::new(db_pool.clone())),
        queue.clone(),
    );

    // Create shared application state
    let state = AppState::new(db_pool, queue, orchestrator);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/explain", post(routes::explain::submit_explanation))
        .route("/api/v1/explain/{owner_id}", get(routes::explain::list_jobs))
        .route(
            "/api/v1/explain/{owner_id}/{job_id}",
            get(routes::explain::get_job_status),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // JSON bodies only

    tracing::info!("Starting explain-jobs on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
