use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::job::DispatchPayload;

const QUEUE_KEY: &str = "explain_jobs:dispatch";

/// Fire-and-forget trigger for out-of-band worker runs.
///
/// A successful `dispatch` only means the payload was handed over; it says
/// nothing about whether a worker will ever pick it up.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<(), QueueError>;
}

/// Redis list used as a best-effort work queue.
///
/// Payloads are removed on pop, so a worker that crashes mid-run loses the job
/// (at-most-once delivery).
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Pop the oldest dispatched payload, if any.
    pub async fn dequeue(&self) -> Result<Option<DispatchPayload>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let result: Option<String> = conn
            .rpop(QUEUE_KEY, None)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let job: DispatchPayload =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Number of dispatched payloads not yet picked up.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[async_trait]
impl Dispatcher for JobQueue {
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let body = serde_json::to_string(payload).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &body)
            .await
            .map_err(QueueError::Redis)?;
        tracing::debug!(job_id = %payload.job_id, "Worker run dispatched");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Dispatch rejected: {0}")]
    Rejected(String),
}
