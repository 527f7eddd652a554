use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

const SUBMISSION_QUEUE_KEY: &str = "photo_verify:submissions";
const SUBMISSION_PROCESSING_KEY: &str = "photo_verify:submissions:processing";
const SUBMISSION_SCHEDULED_KEY: &str = "photo_verify:submissions:scheduled";
const EMAIL_QUEUE_KEY: &str = "photo_verify:status_emails";
const EMAIL_PROCESSING_KEY: &str = "photo_verify:status_emails:processing";

/// Submission job payload serialized into Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSubmission {
    pub receipt_id: Uuid,
    /// Prior attempt whose ID-photo data should be resent, if any.
    pub copy_id_photo_from: Option<Uuid>,
    /// Zero-based attempt index; the initial submission runs with 0.
    #[serde(default)]
    pub retries: u32,
}

/// Status email job payload serialized into Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedStatusEmail {
    pub subject: String,
    /// Named template id resolved by the mailer.
    pub template: String,
    pub email_vars: HashMap<String, String>,
    /// Destination address.
    pub email: String,
}

/// Redis-backed job queues: one list per job kind, plus a sorted set holding
/// delayed submission retries scored by their due time. The delay between
/// retry attempts is enforced here, not by sleeping in the worker.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }

    /// Enqueue a vendor submission for immediate processing.
    pub async fn enqueue_submission(&self, job: &QueuedSubmission) -> Result<(), QueueError> {
        self.push(SUBMISSION_QUEUE_KEY, job).await
    }

    /// Enqueue a status notification email.
    pub async fn enqueue_status_email(&self, job: &QueuedStatusEmail) -> Result<(), QueueError> {
        self.push(EMAIL_QUEUE_KEY, job).await
    }

    /// Schedule a submission retry to become due after `delay`.
    pub async fn schedule_submission_retry(
        &self,
        job: &QueuedSubmission,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        let due_at = now_epoch_secs() + delay.as_secs() as f64;
        conn.zadd::<_, _, _, ()>(SUBMISSION_SCHEDULED_KEY, &payload, due_at)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Move scheduled retries whose due time has passed back onto the
    /// submission queue. Returns how many were promoted.
    pub async fn promote_due_retries(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn().await?;
        let now = now_epoch_secs();
        let due: Vec<String> = conn
            .zrangebyscore(SUBMISSION_SCHEDULED_KEY, "-inf", now)
            .await
            .map_err(QueueError::Redis)?;

        for payload in &due {
            conn.zrem::<_, _, ()>(SUBMISSION_SCHEDULED_KEY, payload)
                .await
                .map_err(QueueError::Redis)?;
            conn.lpush::<_, _, ()>(SUBMISSION_QUEUE_KEY, payload)
                .await
                .map_err(QueueError::Redis)?;
        }
        Ok(due.len())
    }

    /// Dequeue a submission job (non-blocking pop with move to processing list).
    pub async fn dequeue_submission(&self) -> Result<Option<QueuedSubmission>, QueueError> {
        self.pop(SUBMISSION_QUEUE_KEY, SUBMISSION_PROCESSING_KEY).await
    }

    /// Dequeue a status email job.
    pub async fn dequeue_status_email(&self) -> Result<Option<QueuedStatusEmail>, QueueError> {
        self.pop(EMAIL_QUEUE_KEY, EMAIL_PROCESSING_KEY).await
    }

    /// Mark a submission job as done (remove from the processing list).
    pub async fn complete_submission(&self, job: &QueuedSubmission) -> Result<(), QueueError> {
        self.complete(SUBMISSION_PROCESSING_KEY, job).await
    }

    /// Mark a status email job as done.
    pub async fn complete_status_email(&self, job: &QueuedStatusEmail) -> Result<(), QueueError> {
        self.complete(EMAIL_PROCESSING_KEY, job).await
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Pending submissions, not counting scheduled retries.
    pub async fn submission_queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        conn.llen(SUBMISSION_QUEUE_KEY).await.map_err(QueueError::Redis)
    }

    async fn push<T: Serialize>(&self, key: &str, job: &T) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(key, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn pop<T: DeserializeOwned>(
        &self,
        queue_key: &str,
        processing_key: &str,
    ) -> Result<Option<T>, QueueError> {
        let mut conn = self.conn().await?;
        let result: Option<String> = conn
            .rpoplpush(queue_key, processing_key)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let job: T = serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn complete<T: Serialize>(&self, processing_key: &str, job: &T) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(processing_key, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_payload_round_trip() {
        let job = QueuedSubmission {
            receipt_id: Uuid::new_v4(),
            copy_id_photo_from: Some(Uuid::new_v4()),
            retries: 2,
        };
        let payload = serde_json::to_string(&job).unwrap();
        let back: QueuedSubmission = serde_json::from_str(&payload).unwrap();
        assert_eq!(back.receipt_id, job.receipt_id);
        assert_eq!(back.copy_id_photo_from, job.copy_id_photo_from);
        assert_eq!(back.retries, 2);
    }

    #[test]
    fn test_submission_retries_default_to_zero() {
        // Payloads written before the retry field existed must still parse.
        let payload = format!(
            r#"{{"receipt_id":"{}","copy_id_photo_from":null}}"#,
            Uuid::new_v4()
        );
        let job: QueuedSubmission = serde_json::from_str(&payload).unwrap();
        assert_eq!(job.retries, 0);
    }
}
