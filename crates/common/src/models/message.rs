use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound alpha-chat message. A non-null `classified_at` means the
/// message has been classified and is never reclassified.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub source: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub classified_at: Option<DateTime<Utc>>,
    pub is_signal_candidate: Option<bool>,
    pub extracted_tokens: Option<String>, // JSON array of token symbols
    pub confidence: Option<f64>,
    pub sentiment: Option<String>,
    pub model: Option<String>,
    pub signature: Option<String>,
    pub raw_output: Option<String>,
    pub reasoning: Option<String>,
}

/// Outcome of the opaque classification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub is_signal_candidate: bool,
    pub extracted_tokens: Vec<String>,
    pub confidence: f64,
    pub sentiment: String,
    pub model: String,
    pub signature: String,
    pub raw_output: String,
    pub reasoning: String,
}
