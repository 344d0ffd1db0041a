pub mod message_service;
pub mod signal_executor;
pub mod trigger_service;
pub mod worker_service;

use std::sync::Arc;

use common::config::Config;
use coordination::LockService;
use sqlx::SqlitePool;
use venue::{AlphaClassifier, VenueClient};

/// Everything a job handler needs, cloned into each spawned job task.
#[derive(Clone)]
pub struct JobContext {
    pub pool: SqlitePool,
    pub locks: Arc<dyn LockService>,
    pub venue: Arc<dyn VenueClient>,
    pub classifier: Arc<dyn AlphaClassifier>,
    pub config: Config,
}

/// Terminal result of one job invocation. `Err` is reserved for retryable
/// failures so the queue stays the only retry driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The work was performed by this invocation.
    Done,
    /// Another invocation already produced the result; safe no-op.
    AlreadyDone,
    /// A concurrent legitimate worker holds the row lock; success, not an
    /// error.
    SkippedContention,
    /// Terminal domain failure, written to the row.
    FailedTerminal(String),
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::AlreadyDone => write!(f, "already done"),
            Self::SkippedContention => write!(f, "skipped (held by another worker)"),
            Self::FailedTerminal(reason) => write!(f, "failed terminally: {}", reason),
        }
    }
}

/// Truncated identifier for log lines. Ids are arbitrary TEXT, so the cut
/// must land on a char boundary.
pub(crate) fn short(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_truncates_long_ids() {
        assert_eq!(short("0123456789abcdef"), "0123456789ab");
        assert_eq!(short("s1"), "s1");
        assert_eq!(short(""), "");
    }

    #[test]
    fn short_respects_char_boundaries() {
        // the 12th byte falls inside the two-byte 'é'
        assert_eq!(short("aaaaaaaaaaaé-signal"), "aaaaaaaaaaaé");
        assert_eq!(short("déploiement-été-01"), "déploiement-");
    }
}
