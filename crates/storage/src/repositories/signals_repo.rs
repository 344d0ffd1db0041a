use chrono::{DateTime, Utc};
use common::models::Signal;
use sqlx::SqlitePool;

/// One row the trigger should turn into an `execute-{signal}-{deployment}` job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExecutionCandidate {
    pub signal_id: String,
    pub deployment_id: String,
}

pub struct SignalsRepository;

impl SignalsRepository {
    pub async fn insert(pool: &SqlitePool, signal: &Signal) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO signals (
                    id, agent_id, deployment_id, token, side, venue, allocation_pct,
                    leverage, rationale, execute_requested, retry_count,
                    last_retry_error, skipped_reason, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&signal.id)
        .bind(&signal.agent_id)
        .bind(&signal.deployment_id)
        .bind(&signal.token)
        .bind(&signal.side)
        .bind(&signal.venue)
        .bind(signal.allocation_pct)
        .bind(signal.leverage)
        .bind(&signal.rationale)
        .bind(signal.execute_requested)
        .bind(signal.retry_count)
        .bind(&signal.last_retry_error)
        .bind(&signal.skipped_reason)
        .bind(signal.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Signal>, sqlx::Error> {
        sqlx::query_as::<_, Signal>("SELECT * FROM signals WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Signals that should exist as execute jobs but may not: a target
    /// deployment, no Position yet, execution requested with a positive
    /// allocation, listed agent, ACTIVE deployment, not terminally failed.
    /// Rows that already failed retryably are bounded to the retry window
    /// so stale failures are not resurrected.
    pub async fn execution_candidates(
        pool: &SqlitePool,
        retry_cutoff: DateTime<Utc>,
    ) -> Result<Vec<ExecutionCandidate>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionCandidate>(
            r#"
                SELECT s.id AS signal_id, s.deployment_id AS deployment_id
                FROM signals s
                JOIN deployments d ON d.id = s.deployment_id
                JOIN agents a ON a.id = s.agent_id
                LEFT JOIN positions p
                    ON p.deployment_id = s.deployment_id AND p.signal_id = s.id
                WHERE p.id IS NULL
                  AND s.deployment_id IS NOT NULL
                  AND s.execute_requested = 1
                  AND s.allocation_pct > 0
                  AND s.skipped_reason IS NULL
                  AND d.status = 'ACTIVE'
                  AND a.visibility IN ('PUBLIC', 'PRIVATE')
                  AND (s.retry_count = 0 OR s.created_at >= ?)
                ORDER BY s.created_at
            "#,
        )
        .bind(retry_cutoff)
        .fetch_all(pool)
        .await
    }

    /// Annotates a retryable failure: bumps the counter, records the error
    /// and clears any terminal marker so the two can never coexist.
    pub async fn mark_retrying(
        pool: &SqlitePool,
        id: &str,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                UPDATE signals
                SET retry_count = retry_count + 1,
                    last_retry_error = ?,
                    skipped_reason = NULL
                WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Writes the terminal failure reason and clears the retry annotation.
    pub async fn mark_failed(pool: &SqlitePool, id: &str, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                UPDATE signals
                SET skipped_reason = ?,
                    last_retry_error = NULL
                WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Clears the retry annotation once a Position exists. The counter is
    /// kept for observability.
    pub async fn clear_retry_marker(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE signals SET last_retry_error = NULL WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repositories::{AgentsRepository, DeploymentsRepository, PositionsRepository};
    use chrono::Duration;
    use common::models::{Agent, Deployment, PositionInsert};

    fn agent(id: &str, visibility: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("agent {}", id),
            visibility: visibility.to_string(),
        }
    }

    fn deployment(id: &str, agent_id: &str, status: &str) -> Deployment {
        Deployment {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            wallet_address: "0xA".to_string(),
            status: status.to_string(),
        }
    }

    fn signal(id: &str, agent_id: &str, deployment_id: &str) -> Signal {
        Signal {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            deployment_id: Some(deployment_id.to_string()),
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
        }
    }

    #[tokio::test]
    async fn candidates_exclude_ineligible_rows() {
        let pool = db::connect_temp().await;
        AgentsRepository::insert(&pool, &agent("a1", "PUBLIC"))
            .await
            .unwrap();
        AgentsRepository::insert(&pool, &agent("a2", "UNLISTED"))
            .await
            .unwrap();
        DeploymentsRepository::insert(&pool, &deployment("d1", "a1", "ACTIVE"))
            .await
            .unwrap();
        DeploymentsRepository::insert(&pool, &deployment("d2", "a1", "PAUSED"))
            .await
            .unwrap();
        DeploymentsRepository::insert(&pool, &deployment("d3", "a2", "ACTIVE"))
            .await
            .unwrap();

        // eligible
        SignalsRepository::insert(&pool, &signal("s1", "a1", "d1"))
            .await
            .unwrap();
        // inactive deployment
        SignalsRepository::insert(&pool, &signal("s2", "a1", "d2"))
            .await
            .unwrap();
        // unlisted agent
        SignalsRepository::insert(&pool, &signal("s3", "a2", "d3"))
            .await
            .unwrap();
        // zero allocation
        let mut s4 = signal("s4", "a1", "d1");
        s4.allocation_pct = 0.0;
        SignalsRepository::insert(&pool, &s4).await.unwrap();
        // terminally failed
        let mut s5 = signal("s5", "a1", "d1");
        s5.skipped_reason = Some("Insufficient margin".to_string());
        SignalsRepository::insert(&pool, &s5).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let candidates = SignalsRepository::execution_candidates(&pool, cutoff)
            .await
            .unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.signal_id.as_str()).collect();
        assert_eq!(ids, vec!["s1"]);
    }

    #[tokio::test]
    async fn candidates_drop_stale_retrying_signals() {
        let pool = db::connect_temp().await;
        AgentsRepository::insert(&pool, &agent("a1", "PUBLIC"))
            .await
            .unwrap();
        DeploymentsRepository::insert(&pool, &deployment("d1", "a1", "ACTIVE"))
            .await
            .unwrap();

        let mut stale = signal("s-old", "a1", "d1");
        stale.retry_count = 2;
        stale.last_retry_error = Some("ECONNRESET".to_string());
        stale.created_at = Utc::now() - Duration::hours(30);
        SignalsRepository::insert(&pool, &stale).await.unwrap();

        let mut fresh = signal("s-new", "a1", "d1");
        fresh.retry_count = 1;
        fresh.last_retry_error = Some("ECONNRESET".to_string());
        SignalsRepository::insert(&pool, &fresh).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let candidates = SignalsRepository::execution_candidates(&pool, cutoff)
            .await
            .unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.signal_id.as_str()).collect();
        assert_eq!(ids, vec!["s-new"]);
    }

    #[tokio::test]
    async fn candidates_skip_signals_with_positions() {
        let pool = db::connect_temp().await;
        AgentsRepository::insert(&pool, &agent("a1", "PUBLIC"))
            .await
            .unwrap();
        DeploymentsRepository::insert(&pool, &deployment("d1", "a1", "ACTIVE"))
            .await
            .unwrap();
        SignalsRepository::insert(&pool, &signal("s1", "a1", "d1"))
            .await
            .unwrap();
        PositionsRepository::upsert(
            &pool,
            &PositionInsert {
                deployment_id: "d1".to_string(),
                signal_id: "s1".to_string(),
                token: "ETH".to_string(),
                side: "LONG".to_string(),
                entry_price: 3200.0,
                collateral: 500.0,
                tx_hash: None,
                trade_id: None,
            },
        )
        .await
        .unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let candidates = SignalsRepository::execution_candidates(&pool, cutoff)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn retry_and_terminal_markers_are_mutually_exclusive() {
        let pool = db::connect_temp().await;
        AgentsRepository::insert(&pool, &agent("a1", "PUBLIC"))
            .await
            .unwrap();
        DeploymentsRepository::insert(&pool, &deployment("d1", "a1", "ACTIVE"))
            .await
            .unwrap();
        SignalsRepository::insert(&pool, &signal("s1", "a1", "d1"))
            .await
            .unwrap();

        SignalsRepository::mark_retrying(&pool, "s1", "ECONNRESET")
            .await
            .unwrap();
        let s = SignalsRepository::find_by_id(&pool, "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s.retry_count, 1);
        assert_eq!(s.last_retry_error.as_deref(), Some("ECONNRESET"));
        assert!(s.skipped_reason.is_none());

        SignalsRepository::mark_failed(&pool, "s1", "Insufficient margin")
            .await
            .unwrap();
        let s = SignalsRepository::find_by_id(&pool, "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s.skipped_reason.as_deref(), Some("Insufficient margin"));
        assert!(s.last_retry_error.is_none());
        // counter survives for observability
        assert_eq!(s.retry_count, 1);

        SignalsRepository::mark_retrying(&pool, "s1", "503 Service Unavailable")
            .await
            .unwrap();
        let s = SignalsRepository::find_by_id(&pool, "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s.retry_count, 2);
        assert!(s.skipped_reason.is_none());
    }
}
