use serde::{Deserialize, Serialize};

/// A user's subscription binding an agent to an execution wallet.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deployment {
    pub id: String,
    pub agent_id: String,
    pub wallet_address: String,
    pub status: String, // must be "ACTIVE" to execute
}

impl Deployment {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}
