use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the dispatch queue
    pub redis_url: String,

    /// R2 bucket holding job artifacts
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// Explainability engine inference endpoint. Required by the worker only.
    #[serde(default)]
    pub engine_url: Option<String>,

    /// Bearer token for the engine endpoint
    #[serde(default)]
    pub engine_api_token: Option<String>,

    /// Labels indexed by predicted class (comma-separated in the environment)
    #[serde(default = "default_class_labels")]
    pub class_labels: Vec<String>,

    /// Superpixel grid size per axis; 0 disables the superpixel ranking
    #[serde(default = "default_superpixel_grid")]
    pub superpixel_grid: usize,

    /// Store a heat-map PNG next to each result
    #[serde(default = "default_true")]
    pub render_visualizations: bool,

    /// Jobs a worker process runs at the same time
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Sleep between empty queue polls
    #[serde(default = "default_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,

    /// Prometheus scrape address of a worker process
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_class_labels() -> Vec<String> {
    vec![
        "no aneurysm detected".to_string(),
        "aneurysm detected".to_string(),
    ]
}

fn default_superpixel_grid() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
