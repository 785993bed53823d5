use sqlx::PgPool;

use crate::db::models::ContactMessageRecord;
use crate::error::{AppError, Result};

pub struct ContactService {
    db_pool: PgPool,
}

impl ContactService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn create(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        subject: &str,
        message: &str,
    ) -> Result<ContactMessageRecord> {
        let record = sqlx::query_as::<_, ContactMessageRecord>(
            r#"
            INSERT INTO contact_messages (name, email, phone, subject, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(subject)
        .bind(message)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(record)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ContactMessageRecord>> {
        let messages = sqlx::query_as::<_, ContactMessageRecord>(
            r#"
            SELECT * FROM contact_messages
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(messages)
    }

    pub async fn mark_read(&self, message_id: i32) -> Result<bool> {
        let result = sqlx::query(r#"UPDATE contact_messages SET is_read = TRUE WHERE id = $1"#)
            .bind(message_id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
