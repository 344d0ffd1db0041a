use common::models::Deployment;
use sqlx::SqlitePool;

pub struct DeploymentsRepository;

impl DeploymentsRepository {
    pub async fn insert(pool: &SqlitePool, deployment: &Deployment) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO deployments (id, agent_id, wallet_address, status)
                VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&deployment.id)
        .bind(&deployment.agent_id)
        .bind(&deployment.wallet_address)
        .bind(&deployment.status)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: &str,
    ) -> Result<Option<Deployment>, sqlx::Error> {
        sqlx::query_as::<_, Deployment>("SELECT * FROM deployments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
