use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::models::JobPayload;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend unavailable: {0}")]
    Backend(String),
}

/// A delivered job. `attempts` counts prior deliveries, so the first
/// delivery carries 0.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub payload: JobPayload,
    pub attempts: u32,
}

/// Depth counters surfaced by the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub active: usize,
    pub delayed: usize,
    pub completed: u64,
    pub failed: u64,
}

/// Durable, at-least-once delivery of typed job payloads with dedup by job
/// identifier. Redelivery with backoff (`retry`) is the only retry driver
/// in the pipeline; workers never sleep-and-retry inline.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue with dedup: returns false (a no-op) if a job with this id is
    /// already waiting, delayed or active.
    async fn enqueue(&self, id: &str, payload: JobPayload) -> Result<bool, QueueError>;

    /// Non-blocking pull. A returned job is counted active until
    /// `complete`, `retry` or `fail` is called for it.
    async fn dequeue(&self) -> Result<Option<Job>, QueueError>;

    async fn complete(&self, id: &str) -> Result<(), QueueError>;

    /// Redeliver the job after `delay` with its attempt count bumped. The
    /// job id stays in the dedup set the whole time.
    async fn retry(&self, job: Job, delay: Duration) -> Result<(), QueueError>;

    /// Terminal failure: the job leaves the queue and frees its id.
    async fn fail(&self, id: &str) -> Result<(), QueueError>;

    async fn counts(&self) -> Result<QueueCounts, QueueError>;

    async fn ping(&self) -> Result<(), QueueError>;
}

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<Job>,
    delayed: Vec<(Instant, Job)>,
    // ids of jobs that are waiting, delayed or active
    pending_ids: HashSet<String>,
    active: usize,
    completed: u64,
    failed: u64,
}

impl QueueState {
    fn promote_due(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].0 <= now {
                let (_, job) = self.delayed.swap_remove(i);
                self.waiting.push_back(job);
            } else {
                i += 1;
            }
        }
    }

    fn settle(&mut self, id: &str) {
        self.active = self.active.saturating_sub(1);
        self.pending_ids.remove(id);
    }
}

/// In-process queue backing the `JobQueue` contract: a waiting deque, a
/// delayed set promoted on dequeue, and a dedup id set.
#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, id: &str, payload: JobPayload) -> Result<bool, QueueError> {
        let mut state = self.state.lock().expect("queue state poisoned");
        if !state.pending_ids.insert(id.to_string()) {
            return Ok(false);
        }
        state.waiting.push_back(Job {
            id: id.to_string(),
            payload,
            attempts: 0,
        });
        Ok(true)
    }

    async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        let mut state = self.state.lock().expect("queue state poisoned");
        state.promote_due(Instant::now());
        let job = state.waiting.pop_front();
        if job.is_some() {
            state.active += 1;
        }
        Ok(job)
    }

    async fn complete(&self, id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("queue state poisoned");
        state.settle(id);
        state.completed += 1;
        Ok(())
    }

    async fn retry(&self, mut job: Job, delay: Duration) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("queue state poisoned");
        state.active = state.active.saturating_sub(1);
        job.attempts += 1;
        state.delayed.push((Instant::now() + delay, job));
        Ok(())
    }

    async fn fail(&self, id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("queue state poisoned");
        state.settle(id);
        state.failed += 1;
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let state = self.state.lock().expect("queue state poisoned");
        Ok(QueueCounts {
            waiting: state.waiting.len(),
            active: state.active,
            delayed: state.delayed.len(),
            completed: state.completed,
            failed: state.failed,
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
