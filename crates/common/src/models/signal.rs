use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trading intent produced upstream, targeting a token/side/venue with
/// sizing parameters. Immutable once created except for the retry/terminal
/// markers, which form a three-state machine: untouched, retry-annotated
/// (`last_retry_error` + `retry_count`), or terminally failed
/// (`skipped_reason`). The two markers are never both set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Signal {
    pub id: String,
    pub agent_id: String,
    pub deployment_id: Option<String>,
    pub token: String,
    pub side: String, // "LONG" or "SHORT"
    pub venue: String,
    pub allocation_pct: f64,
    pub leverage: f64,
    pub rationale: String,
    pub execute_requested: bool,
    pub retry_count: i64,
    pub last_retry_error: Option<String>,
    pub skipped_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
