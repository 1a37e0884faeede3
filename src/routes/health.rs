use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub job_records: ComponentHealth,
    pub dispatch_queue: ComponentHealth,
    /// Dispatched runs no worker has picked up yet.
    pub pending_dispatches: Option<u64>,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn from_result<E>(result: Result<(), E>, started: Instant) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                latency_ms: Some(started.elapsed().as_millis() as u64),
            },
            Err(_) => Self {
                status: "error".to_string(),
                latency_ms: None,
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health — dependency status of the API process.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_start = Instant::now();
    let db_result = sqlx::query("SELECT 1").execute(&state.db).await.map(|_| ());
    let job_records = ComponentHealth::from_result(db_result, db_start);

    let queue_start = Instant::now();
    let dispatch_queue = ComponentHealth::from_result(state.queue.health_check().await, queue_start);

    let pending_dispatches = if dispatch_queue.is_ok() {
        state.queue.queue_depth().await.ok()
    } else {
        None
    };
    if let Some(depth) = pending_dispatches {
        metrics::gauge!("explain_queue_depth").set(depth as f64);
    }

    let all_healthy = job_records.is_ok() && dispatch_queue.is_ok();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            job_records,
            dispatch_queue,
            pending_dispatches,
        },
    };

    (status_code, Json(response))
}
