use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub visibility: String, // "PUBLIC", "PRIVATE" or "UNLISTED"
}

impl Agent {
    pub fn is_listed(&self) -> bool {
        self.visibility == "PUBLIC" || self.visibility == "PRIVATE"
    }
}
