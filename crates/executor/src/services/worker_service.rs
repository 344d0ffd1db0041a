use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::JobPayload;
use coordination::{Job, JobQueue};
use tokio::sync::{Semaphore, mpsc};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::retry::backoff_delay;
use crate::services::{JobContext, message_service, signal_executor};

const DEQUEUE_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Execute,
    Classify,
}

/// One worker in the pool: pulls jobs from its pipeline's queue and runs up
/// to `concurrency` of them at a time, each in its own task. Effective
/// parallel capacity is worker_count x concurrency.
pub struct WorkerService {
    index: u8,
    pipeline: Pipeline,
    queue: Arc<dyn JobQueue>,
    ctx: JobContext,
    concurrency: usize,
}

#[async_trait]
impl Actor for WorkerService {
    fn name(&self) -> ActorType {
        match self.pipeline {
            Pipeline::Execute => ActorType::ExecuteWorker(self.index),
            Pipeline::Classify => ActorType::ClassifyWorker(self.index),
        }
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        info!(
            "Starting {:?} worker #{} (concurrency: {})",
            self.pipeline, self.index, self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        loop {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Failed to acquire job slot permit")?;

            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    let queue = self.queue.clone();
                    let ctx = self.ctx.clone();
                    let pipeline = self.pipeline;
                    tokio::spawn(async move {
                        handle_job(pipeline, job, queue, ctx).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    time::sleep(DEQUEUE_POLL_INTERVAL).await;
                }
                Err(e) => {
                    drop(permit);
                    error!("Dequeue failed: {}", e);
                    time::sleep(DEQUEUE_POLL_INTERVAL).await;
                }
            }
        }
    }
}

impl WorkerService {
    pub fn new(
        index: u8,
        pipeline: Pipeline,
        queue: Arc<dyn JobQueue>,
        ctx: JobContext,
        concurrency: usize,
    ) -> Self {
        Self {
            index,
            pipeline,
            queue,
            ctx,
            concurrency,
        }
    }
}

/// Runs one dequeued job through its pipeline's handler and settles it on
/// the queue: completed, requeued-for-retry, or failed-terminal.
pub async fn handle_job(pipeline: Pipeline, job: Job, queue: Arc<dyn JobQueue>, ctx: JobContext) {
    debug!("Job {} received (attempt {})", job.id, job.attempts + 1);

    let outcome = match (pipeline, &job.payload) {
        (
            Pipeline::Execute,
            JobPayload::ExecuteSignal {
                signal_id,
                deployment_id,
                ..
            },
        ) => signal_executor::execute_signal(&ctx, signal_id, deployment_id).await,
        (Pipeline::Classify, JobPayload::ClassifyMessage { message_id, .. }) => {
            message_service::classify_message(&ctx, message_id).await
        }
        // A payload that does not belong to this pipeline is a programming-
        // contract failure; retrying cannot fix a code-level mismatch.
        _ => {
            error!(
                "Job {} payload does not belong to the {:?} pipeline",
                job.id, pipeline
            );
            if let Err(e) = queue.fail(&job.id).await {
                error!("Failed to settle job {}: {}", job.id, e);
            }
            return;
        }
    };

    match outcome {
        Ok(outcome) => {
            info!("Job {} completed: {}", job.id, outcome);
            if let Err(e) = queue.complete(&job.id).await {
                error!("Failed to settle job {}: {}", job.id, e);
            }
        }
        Err(e) => {
            let delay = backoff_delay(job.attempts);
            warn!("Job {} requeued for retry in {:?}: {}", job.id, delay, e);
            let job_id = job.id.clone();
            if let Err(e) = queue.retry(job, delay).await {
                error!("Failed to requeue job {}: {}", job_id, e);
            }
        }
    }
}
