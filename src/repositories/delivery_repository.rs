use crate::error::AppResult;
use crate::models::{DeliveryRecord, DeliveryStatus, NotificationLog};
use crate::repositories::DeliveryLedger;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed delivery ledger
pub struct DeliveryRepository {
    pool: PgPool,
}

impl DeliveryRepository {
    /// Create a new DeliveryRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLedger for DeliveryRepository {
    async fn upsert_log(&self, log: &NotificationLog) -> AppResult<Uuid> {
        // Duplicate finalization of the same event lands on the row the
        // first attempt created.
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO notification_log (id, event_key, asset_id, new_ath, previous_ath, sent_at, recipient_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_key) DO UPDATE SET sent_at = EXCLUDED.sent_at
            RETURNING id
            "#,
        )
        .bind(log.id)
        .bind(&log.event_key)
        .bind(&log.asset_id)
        .bind(log.new_ath)
        .bind(log.previous_ath)
        .bind(log.sent_at)
        .bind(log.recipient_count)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn finalize_recipient_count(&self, log_id: Uuid, count: i32) -> AppResult<()> {
        sqlx::query("UPDATE notification_log SET recipient_count = $2 WHERE id = $1")
            .bind(log_id)
            .bind(count)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_delivery(&self, record: &DeliveryRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deliveries
                (id, log_id, user_id, recipient_email, message_type, status,
                 provider_message_id, sent_at, resolved_at, error_detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.log_id)
        .bind(record.user_id)
        .bind(&record.recipient_email)
        .bind(&record.message_type)
        .bind(&record.status)
        .bind(&record.provider_message_id)
        .bind(record.sent_at)
        .bind(record.resolved_at)
        .bind(&record.error_detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_resolved(
        &self,
        delivery_id: Uuid,
        status: DeliveryStatus,
        error_detail: Option<String>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = $2, resolved_at = $3, error_detail = COALESCE($4, error_detail)
            WHERE id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(error_detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deliveries_for_log(&self, log_id: Uuid) -> AppResult<Vec<DeliveryRecord>> {
        let records = sqlx::query_as::<_, DeliveryRecord>(
            r#"
            SELECT id, log_id, user_id, recipient_email, message_type, status,
                   provider_message_id, sent_at, resolved_at, error_detail
            FROM deliveries
            WHERE log_id = $1
            ORDER BY sent_at
            "#,
        )
        .bind(log_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
