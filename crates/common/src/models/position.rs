use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The durable record of one executed trade. `(deployment_id, signal_id)`
/// is unique: repeated execution attempts collapse into this single row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Position {
    pub id: String,
    pub deployment_id: String,
    pub signal_id: String,
    pub token: String,
    pub side: String,
    pub entry_price: f64,
    pub collateral: f64,
    pub tx_hash: Option<String>,
    pub trade_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PositionInsert {
    pub deployment_id: String,
    pub signal_id: String,
    pub token: String,
    pub side: String,
    pub entry_price: f64,
    pub collateral: f64,
    pub tx_hash: Option<String>,
    pub trade_id: Option<String>,
}
