use chrono::Utc;
use common::models::{Classification, Message};
use sqlx::SqlitePool;

pub struct MessagesRepository;

impl MessagesRepository {
    pub async fn insert(pool: &SqlitePool, message: &Message) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO messages (id, source, content, created_at)
                VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.source)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn unclassified_ids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM messages WHERE classified_at IS NULL ORDER BY created_at",
        )
        .fetch_all(pool)
        .await
    }

    /// Writes the classification outcome once. Returns false if another
    /// worker classified the message first (the WHERE guard lost the race).
    pub async fn store_classification(
        pool: &SqlitePool,
        id: &str,
        classification: &Classification,
    ) -> Result<bool, sqlx::Error> {
        let tokens = serde_json::to_string(&classification.extracted_tokens)
            .unwrap_or_else(|_| "[]".to_string());
        let result = sqlx::query(
            r#"
                UPDATE messages
                SET classified_at = ?,
                    is_signal_candidate = ?,
                    extracted_tokens = ?,
                    confidence = ?,
                    sentiment = ?,
                    model = ?,
                    signature = ?,
                    raw_output = ?,
                    reasoning = ?
                WHERE id = ? AND classified_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(classification.is_signal_candidate)
        .bind(tokens)
        .bind(classification.confidence)
        .bind(&classification.sentiment)
        .bind(&classification.model)
        .bind(&classification.signature)
        .bind(&classification.raw_output)
        .bind(&classification.reasoning)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Terminal classification failure: the row leaves the candidate set
    /// with the error text preserved in `raw_output`.
    pub async fn mark_failed_classification(
        pool: &SqlitePool,
        id: &str,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                UPDATE messages
                SET classified_at = ?, is_signal_candidate = 0, raw_output = ?
                WHERE id = ? AND classified_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
