use sqlx::PgPool;

use crate::db::models::{NotificationRecord, NotificationType};
use crate::error::{AppError, Result};

pub struct NotificationService {
    db_pool: PgPool,
}

impl NotificationService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Persist a notification row for a user. Callers treat this as a
    /// best-effort side effect: failures are logged and discarded, never
    /// allowed to fail the domain operation that triggered them.
    pub async fn emit(
        &self,
        user_id: i32,
        title: &str,
        message: &str,
        kind: NotificationType,
        data: serde_json::Value,
    ) -> Result<NotificationRecord> {
        let notification = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notifications (user_id, title, message, type, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(kind)
        .bind(data)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(notification)
    }

    pub async fn list_for_user(
        &self,
        user_id: i32,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let notifications = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(notifications)
    }

    // read_at is stamped once; marking an already-read row again is a no-op
    pub async fn mark_read(&self, notification_id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE,
                read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, notification_id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM notifications WHERE id = $1 AND user_id = $2"#)
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
