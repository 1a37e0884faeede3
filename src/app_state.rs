use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{orchestrator::Orchestrator, queue::JobQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<JobQueue>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(db: PgPool, queue: Arc<JobQueue>, orchestrator: Orchestrator) -> Self {
        Self {
            db,
            queue,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
