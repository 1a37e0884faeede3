use explain_jobs::{
    config::AppConfig,
    services::{
        engine::RemoteEngine,
        fetch::HttpImageSource,
        queue::JobQueue,
        segmentation::{GridSegmenter, Segmenter},
        storage::R2Client,
        worker::{Worker, WorkerSettings},
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
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

    tracing::info!("Starting explainability worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");
    let engine_url = config
        .engine_url
        .as_deref()
        .expect("ENGINE_URL must be set for the worker");

    // Worker metrics are scraped from the worker process itself
    let metrics_addr: SocketAddr = config
        .worker_metrics_addr
        .parse()
        .expect("WORKER_METRICS_ADDR must be a socket address");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics exporter");
    tracing::info!("Serving worker metrics on {}", metrics_addr);

    metrics::describe_counter!(
        "explain_worker_runs_total",
        "Worker runs that wrote a terminal artifact, by outcome"
    );
    metrics::describe_histogram!(
        "explain_worker_duration_seconds",
        "Wall time of one worker run"
    );

    // Initialize collaborators
    tracing::info!("Initializing services");
    let r2_client = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 client");

    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    let engine = RemoteEngine::new(engine_url, config.engine_api_token.as_deref())
        .expect("Failed to initialize explainability engine client");

    let images = HttpImageSource::new().expect("Failed to initialize image fetch client");

    let segmenter: Option<Arc<dyn Segmenter>> = match config.superpixel_grid {
        0 => None,
        cells => Some(Arc::new(
            GridSegmenter::new(cells).expect("Failed to initialize segmenter"),
        )),
    };

    let worker = Arc::new(Worker::new(
        Arc::new(images),
        Arc::new(engine),
        segmenter,
        Arc::new(r2_client),
        WorkerSettings {
            class_labels: config.class_labels.clone(),
            render_visualizations: config.render_visualizations,
        },
    ));

    let concurrency = config.worker_concurrency.max(1);
    let slots = Arc::new(Semaphore::new(concurrency));
    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms);

    tracing::info!(concurrency, "Worker ready, starting dispatch loop");

    // Main loop: one task per dispatched job, bounded by the semaphore
    loop {
        let permit = match slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        match queue.dequeue().await {
            Ok(Some(payload)) => {
                let worker = worker.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = worker.run(&payload).await {
                        tracing::error!(
                            job_id = %payload.job_id,
                            error = %e,
                            "Job left without a terminal artifact"
                        );
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No jobs dispatched, sleeping");
                sleep(poll_interval).await;
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Error polling dispatch queue, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}
