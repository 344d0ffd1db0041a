use std::time::Duration;

use chrono::{DateTime, Utc};

/// Where a failure message lands in the retry taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient infrastructure noise; re-raised so the queue retries with
    /// backoff.
    Retryable,
    /// Domain-level terminal outcome; written once as the failure reason.
    Fatal,
}

const RETRYABLE_SIGNATURES: &[&str] = &[
    // network / connection
    "econnreset",
    "econnrefused",
    "etimedout",
    "epipe",
    "socket hang up",
    "connection reset",
    "connection refused",
    "connection closed",
    "network",
    // timeouts
    "timeout",
    "timed out",
    // upstream 5xx phrasing
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "http 500",
    "http 502",
    "http 503",
    "http 504",
    "temporarily unavailable",
    // a cold-starting dependency announcing it will recover
    "will retry",
];

/// Pure classification of a failure message. Anything not matching a known
/// transient-infrastructure signature is Fatal: domain rejections,
/// "not found", validation failures, explicit venue rejections.
pub fn classify_error(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if RETRYABLE_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Fatal
    }
}

/// A signal older than the retry window is forced terminal even when its
/// latest error classified retryable.
pub fn retry_window_exceeded(created_at: DateTime<Utc>, window: Duration) -> bool {
    let age = Utc::now().signed_duration_since(created_at);
    age.to_std().map(|age| age > window).unwrap_or(false)
}

/// Queue redelivery delay: exponential from 1s, capped at 5 minutes.
pub fn backoff_delay(attempts: u32) -> Duration {
    let secs = 1u64 << attempts.min(9);
    Duration::from_secs(secs.min(300))
}
