use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::JobPayload;
use coordination::JobQueue;
use sqlx::SqlitePool;
use storage::repositories::{MessagesRepository, SignalsRepository};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Closes the gap between "work exists in storage" and "work exists in the
/// queue". Webhook delivery is not guaranteed, so every tick re-scans for
/// candidate rows and enqueues them under their deterministic job id;
/// queue-level dedup makes re-triggering a no-op.
pub struct TriggerService {
    pool: SqlitePool,
    execute_queue: Arc<dyn JobQueue>,
    classify_queue: Arc<dyn JobQueue>,
    interval: Duration,
    retry_window: Duration,
}

#[async_trait]
impl Actor for TriggerService {
    fn name(&self) -> ActorType {
        ActorType::TriggerActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting Trigger Service (interval: {:?})", self.interval);

        // First tick fires immediately: startup doubles as crash recovery.
        let mut tick = time::interval(self.interval);
        loop {
            tick.tick().await;
            if let Err(e) = self.scan_once().await {
                error!("Trigger scan failed: {}", e);
            }
        }
    }
}

impl TriggerService {
    pub fn new(
        pool: SqlitePool,
        execute_queue: Arc<dyn JobQueue>,
        classify_queue: Arc<dyn JobQueue>,
        interval: Duration,
        retry_window: Duration,
    ) -> Self {
        Self {
            pool,
            execute_queue,
            classify_queue,
            interval,
            retry_window,
        }
    }

    /// One scan-and-enqueue pass over both pipelines. Never mutates domain
    /// rows; a malformed candidate is logged and skipped, not allowed to
    /// abort the scan.
    pub async fn scan_once(&self) -> anyhow::Result<()> {
        let retry_cutoff =
            Utc::now() - chrono::Duration::from_std(self.retry_window).unwrap_or_default();

        let candidates = SignalsRepository::execution_candidates(&self.pool, retry_cutoff).await?;
        let mut enqueued_execute = 0;
        for candidate in candidates {
            let payload = JobPayload::ExecuteSignal {
                signal_id: candidate.signal_id.clone(),
                deployment_id: candidate.deployment_id.clone(),
                timestamp: Utc::now().timestamp_millis(),
            };
            let job_id = payload.job_id();
            match self.execute_queue.enqueue(&job_id, payload).await {
                Ok(true) => enqueued_execute += 1,
                Ok(false) => debug!("Job {} already pending, skipping", job_id),
                Err(e) => warn!("Failed to enqueue {}: {}", job_id, e),
            }
        }

        let unclassified = MessagesRepository::unclassified_ids(&self.pool).await?;
        let mut enqueued_classify = 0;
        for message_id in unclassified {
            let payload = JobPayload::ClassifyMessage {
                message_id,
                timestamp: Utc::now().timestamp_millis(),
            };
            let job_id = payload.job_id();
            match self.classify_queue.enqueue(&job_id, payload).await {
                Ok(true) => enqueued_classify += 1,
                Ok(false) => debug!("Job {} already pending, skipping", job_id),
                Err(e) => warn!("Failed to enqueue {}: {}", job_id, e),
            }
        }

        if enqueued_execute > 0 || enqueued_classify > 0 {
            info!(
                "Trigger tick: enqueued {} execute / {} classify jobs",
                enqueued_execute, enqueued_classify
            );
        }
        Ok(())
    }
}
