use serde::Serialize;
use sqlx::PgPool;

use crate::db::models::{TransactionRecord, UserRecord};
use crate::error::{AppError, Result};

/// Platform-wide aggregates for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub total_donated_rwf: i64,
    pub total_jobs_created: i64,
    pub total_backers: i64,
    pub total_entrepreneurs: i64,
    pub total_messages: i64,
    pub unread_messages: i64,
}

pub struct AdminService {
    db_pool: PgPool,
    job_creation_rate: i64,
}

impl AdminService {
    pub fn new(db_pool: PgPool, job_creation_rate: i64) -> Self {
        Self {
            db_pool,
            job_creation_rate,
        }
    }

    pub async fn stats(&self) -> Result<PlatformStats> {
        // only settled money counts toward the public totals
        let total_donated = sqlx::query_scalar::<_, i64>(
            r#"SELECT COALESCE(SUM(amount), 0)::BIGINT FROM transactions WHERE status = 'completed'"#,
        )
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (total_backers, total_entrepreneurs) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*) FILTER (WHERE role = 'backer'),
                   COUNT(*) FILTER (WHERE role = 'entrepreneur')
            FROM users
            "#,
        )
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (total_messages, unread_messages) = sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read) FROM contact_messages"#,
        )
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(PlatformStats {
            total_donated_rwf: total_donated,
            total_jobs_created: total_donated / self.job_creation_rate,
            total_backers,
            total_entrepreneurs,
            total_messages,
            unread_messages,
        })
    }

    pub async fn list_transactions(&self, limit: i64, offset: i64) -> Result<Vec<TransactionRecord>> {
        let transactions = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT * FROM transactions
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(transactions)
    }

    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT * FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users)
    }
}
