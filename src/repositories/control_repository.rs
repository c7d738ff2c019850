use crate::error::{AppError, AppResult};
use crate::models::RunSummary;
use crate::repositories::ControlStore;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

/// Postgres-backed control store: expiring keys for the single-flight
/// lock and cooldowns, plus the last-run status row.
pub struct ControlRepository {
    pool: PgPool,
}

impl ControlRepository {
    /// Create a new ControlRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ControlStore for ControlRepository {
    async fn try_acquire_lock(&self, key: &str, token: &str, ttl: Duration) -> AppResult<bool> {
        // The conflict arm only steals expired claims, so the insert
        // and the expiry check are one atomic statement.
        let result = sqlx::query(
            r#"
            INSERT INTO control_locks (key, token, expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE
                SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
                WHERE control_locks.expires_at < now()
            "#,
        )
        .bind(key)
        .bind(token)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, key: &str, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM control_locks WHERE key = $1 AND token = $2")
            .bind(key)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_cooldown(&self, key: &str, ttl: Duration) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO control_locks (key, expires_at)
            VALUES ($1, now() + make_interval(secs => $2))
            ON CONFLICT (key) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn in_cooldown(&self, key: &str) -> AppResult<bool> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM control_locks WHERE key = $1 AND expires_at > now())",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(active)
    }

    async fn record_last_run(&self, summary: &RunSummary) -> AppResult<()> {
        let payload = serde_json::to_value(summary)?;

        sqlx::query(
            r#"
            INSERT INTO pipeline_status (id, summary, finished_at)
            VALUES (1, $1, $2)
            ON CONFLICT (id) DO UPDATE
                SET summary = EXCLUDED.summary, finished_at = EXCLUDED.finished_at
            "#,
        )
        .bind(payload)
        .bind(summary.finished_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn last_run(&self) -> AppResult<Option<RunSummary>> {
        let row = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT summary FROM pipeline_status WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(value) => {
                let summary = serde_json::from_value(value).map_err(AppError::Serialization)?;
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }
}
