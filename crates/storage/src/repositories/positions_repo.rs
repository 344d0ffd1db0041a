use chrono::Utc;
use common::models::{Position, PositionInsert};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct PositionsRepository;

impl PositionsRepository {
    pub async fn find_by_deployment_and_signal(
        pool: &SqlitePool,
        deployment_id: &str,
        signal_id: &str,
    ) -> Result<Option<Position>, sqlx::Error> {
        sqlx::query_as::<_, Position>(
            "SELECT * FROM positions WHERE deployment_id = ? AND signal_id = ?",
        )
        .bind(deployment_id)
        .bind(signal_id)
        .fetch_optional(pool)
        .await
    }

    /// Atomic upsert keyed by (deployment_id, signal_id). A concurrent
    /// duplicate attempt collapses into the existing row instead of raising
    /// a unique-constraint violation; lock leases can expire mid-call, so
    /// this is a required second safety net, not an optimization.
    pub async fn upsert(pool: &SqlitePool, position: &PositionInsert) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
                INSERT INTO positions (
                    id, deployment_id, signal_id, token, side, entry_price,
                    collateral, tx_hash, trade_id, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (deployment_id, signal_id) DO UPDATE SET
                    entry_price = excluded.entry_price,
                    collateral = excluded.collateral,
                    tx_hash = excluded.tx_hash,
                    trade_id = excluded.trade_id,
                    updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&position.deployment_id)
        .bind(&position.signal_id)
        .bind(&position.token)
        .bind(&position.side)
        .bind(position.entry_price)
        .bind(position.collateral)
        .bind(&position.tx_hash)
        .bind(&position.trade_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM positions")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repositories::{AgentsRepository, DeploymentsRepository, SignalsRepository};
    use common::models::{Agent, Deployment, Signal};

    async fn seed_parents(pool: &SqlitePool, deployment_ids: &[&str], signal_ids: &[&str]) {
        AgentsRepository::insert(
            pool,
            &Agent {
                id: "a1".to_string(),
                name: "agent a1".to_string(),
                visibility: "PUBLIC".to_string(),
            },
        )
        .await
        .unwrap();
        for id in deployment_ids {
            DeploymentsRepository::insert(
                pool,
                &Deployment {
                    id: id.to_string(),
                    agent_id: "a1".to_string(),
                    wallet_address: "0xA".to_string(),
                    status: "ACTIVE".to_string(),
                },
            )
            .await
            .unwrap();
        }
        for id in signal_ids {
            SignalsRepository::insert(
                pool,
                &Signal {
                    id: id.to_string(),
                    agent_id: "a1".to_string(),
                    deployment_id: Some(deployment_ids[0].to_string()),
                    token: "ETH".to_string(),
                    side: "LONG".to_string(),
                    venue: "hyperliquid".to_string(),
                    allocation_pct: 10.0,
                    leverage: 3.0,
                    rationale: "breakout".to_string(),
                    execute_requested: true,
                    retry_count: 0,
                    last_retry_error: None,
                    skipped_reason: None,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
    }

    fn insert_for(deployment_id: &str, signal_id: &str, entry_price: f64) -> PositionInsert {
        PositionInsert {
            deployment_id: deployment_id.to_string(),
            signal_id: signal_id.to_string(),
            token: "ETH".to_string(),
            side: "LONG".to_string(),
            entry_price,
            collateral: 500.0,
            tx_hash: Some("0xabc".to_string()),
            trade_id: Some("t-1".to_string()),
        }
    }

    #[tokio::test]
    async fn repeated_upserts_collapse_into_one_row() {
        let pool = db::connect_temp().await;
        seed_parents(&pool, &["d1"], &["s1"]).await;

        PositionsRepository::upsert(&pool, &insert_for("d1", "s1", 3200.0))
            .await
            .unwrap();
        PositionsRepository::upsert(&pool, &insert_for("d1", "s1", 3210.0))
            .await
            .unwrap();

        assert_eq!(PositionsRepository::count(&pool).await.unwrap(), 1);
        let position = PositionsRepository::find_by_deployment_and_signal(&pool, "d1", "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.entry_price, 3210.0);
    }

    #[tokio::test]
    async fn different_keys_get_distinct_rows() {
        let pool = db::connect_temp().await;
        seed_parents(&pool, &["d1", "d2"], &["s1", "s2"]).await;

        PositionsRepository::upsert(&pool, &insert_for("d1", "s1", 3200.0))
            .await
            .unwrap();
        PositionsRepository::upsert(&pool, &insert_for("d2", "s1", 3200.0))
            .await
            .unwrap();
        PositionsRepository::upsert(&pool, &insert_for("d1", "s2", 3200.0))
            .await
            .unwrap();

        assert_eq!(PositionsRepository::count(&pool).await.unwrap(), 3);
    }
}
