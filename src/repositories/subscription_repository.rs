use crate::error::AppResult;
use crate::models::Subscription;
use crate::repositories::SubscriptionStore;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed subscription store (read-only to the pipeline)
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Create a new SubscriptionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, status, starts_at, ends_at, amount
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY starts_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }
}
