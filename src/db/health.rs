use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

pub struct PostgresHealthCheck {
    pub pool: PgPool,
}

#[async_trait]
impl DatabaseHealth for PostgresHealthCheck {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
