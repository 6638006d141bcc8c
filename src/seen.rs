use crate::types::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

/// Durable record of items already delivered to a user. Records are written
/// only after the delivery collaborator confirms success, so a crash can at
/// worst redeliver, never silently drop.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn has(&self, user_id: Uuid, item_id: &str) -> Result<bool>;
    async fn mark_delivered(&self, user_id: Uuid, item_id: &str) -> Result<()>;
    /// Drop records older than the retention window. Returns the number of
    /// records removed.
    async fn prune(&self, retain_days: i64) -> Result<u64>;
}

pub struct SqliteSeenStore {
    db: SqlitePool,
}

impl SqliteSeenStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SeenStore for SqliteSeenStore {
    async fn has(&self, user_id: Uuid, item_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM seen_items WHERE user_id = ?1 AND item_id = ?2")
            .bind(user_id.to_string())
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_delivered(&self, user_id: Uuid, item_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seen_items (user_id, item_id, delivered_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id, item_id) DO UPDATE SET delivered_at = excluded.delivered_at
            "#,
        )
        .bind(user_id.to_string())
        .bind(item_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        debug!("marked {} delivered for user {}", item_id, user_id);
        Ok(())
    }

    async fn prune(&self, retain_days: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(retain_days);
        let result = sqlx::query("DELETE FROM seen_items WHERE delivered_at < ?1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        let dropped = result.rows_affected();
        if dropped > 0 {
            info!("pruned {} seen records older than {} days", dropped, retain_days);
        }
        Ok(dropped)
    }
}
