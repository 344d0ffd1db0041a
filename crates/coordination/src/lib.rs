pub mod job_queue;
pub mod keys;
pub mod lock_service;

pub use job_queue::{InMemoryJobQueue, Job, JobQueue, QueueCounts, QueueError};
pub use lock_service::{InMemoryLockService, LockError, LockGuard, LockService};
