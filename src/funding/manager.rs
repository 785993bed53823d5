use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    PaymentMethod, ProjectRecord, ProjectStatus, TransactionRecord, TransactionStatus, UserRecord,
};
use crate::db::models::NotificationType;
use crate::db::NotificationService;
use crate::email::Mailer;
use crate::error::{AppError, Result};
use crate::gateway::PaymentGateway;

/// Funding-progress thresholds that trigger a milestone notification.
const MILESTONE_BRACKETS: [u32; 4] = [100, 75, 50, 25];

pub struct InitiateRequest {
    pub project_id: i32,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub phone: Option<String>,
}

pub struct InitiateOutcome {
    pub transaction: TransactionRecord,
    pub jobs_to_create: i32,
    pub message: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BackerTransaction {
    pub id: i32,
    pub amount: i64,
    pub jobs_created: i32,
    pub status: TransactionStatus,
    pub project_id: i32,
    pub project_title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Mediates between a funding request and the payment gateway, then
/// reconciles on the provider's asynchronous webhook confirmation.
pub struct FundingManager {
    db_pool: PgPool,
    gateway: PaymentGateway,
    notifications: Arc<NotificationService>,
    mailer: Arc<Mailer>,
    job_creation_rate: i64,
    min_backing_amount: i64,
}

impl FundingManager {
    pub fn new(
        db_pool: PgPool,
        gateway: PaymentGateway,
        notifications: Arc<NotificationService>,
        mailer: Arc<Mailer>,
        job_creation_rate: i64,
        min_backing_amount: i64,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            notifications,
            mailer,
            job_creation_rate,
            min_backing_amount,
        }
    }

    /// Create a pending transaction and start the charge with the provider.
    ///
    /// Validation happens before anything is persisted; a gateway failure
    /// after persistence flips the row to failed and surfaces a retryable
    /// error to the caller.
    pub async fn initiate(
        &self,
        backer: &UserRecord,
        input: InitiateRequest,
    ) -> Result<InitiateOutcome> {
        if input.amount < self.min_backing_amount {
            return Err(AppError::Validation(format!(
                "Minimum backing is RWF {}",
                self.min_backing_amount
            )));
        }

        let phone = match input.payment_method {
            PaymentMethod::Momo => {
                let phone = input
                    .phone
                    .as_deref()
                    .ok_or_else(|| {
                        AppError::Validation("Phone number is required for mobile money".to_string())
                    })?;
                if !valid_msisdn(phone) {
                    return Err(AppError::Validation(
                        "Invalid phone number. Use +250... or 07...".to_string(),
                    ));
                }
                Some(phone.to_string())
            }
            PaymentMethod::Card => None,
        };

        let project = sqlx::query_as::<_, ProjectRecord>(r#"SELECT * FROM projects WHERE id = $1"#)
            .bind(input.project_id)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

        if !project.is_accepting_funds() {
            return Err(AppError::Validation("Project is not accepting funds".to_string()));
        }

        let jobs_to_create = (input.amount / self.job_creation_rate) as i32;
        let external_id = Uuid::new_v4();

        let transaction = sqlx::query_as::<_, TransactionRecord>(
            r#"
            INSERT INTO transactions (amount, jobs_created, payment_method, external_id, backer_id, project_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.amount)
        .bind(jobs_to_create)
        .bind(input.payment_method)
        .bind(external_id)
        .bind(backer.id)
        .bind(project.id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let gateway_result = match input.payment_method {
            PaymentMethod::Momo => self
                .gateway
                .request_to_pay(input.amount, phone.as_deref().unwrap_or_default(), &external_id)
                .await
                .map(|rtp| {
                    (
                        rtp.reference_id,
                        "Payment request sent. Check your phone.".to_string(),
                        None,
                    )
                }),
            PaymentMethod::Card => self
                .gateway
                .create_checkout_session(project.id, input.amount, &project.title, &external_id)
                .await
                .map(|session| {
                    (
                        session.session_id,
                        "Redirecting to secure payment...".to_string(),
                        Some(session.url),
                    )
                }),
        };

        let (gateway_ref, message, checkout_url) = match gateway_result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Payment initiation failed for tx {}: {}", transaction.id, e);
                if let Err(db_err) = self.mark_failed(transaction.id).await {
                    tracing::error!("Failed to mark tx {} as failed: {}", transaction.id, db_err);
                }
                return Err(e);
            }
        };

        let transaction = sqlx::query_as::<_, TransactionRecord>(
            r#"UPDATE transactions SET gateway_ref = $2, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(transaction.id)
        .bind(&gateway_ref)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if let Err(e) = self
            .notifications
            .emit(
                backer.id,
                "Payment Request Sent",
                &format!(
                    "Your RWF {} payment for **{}** is processing.",
                    transaction.amount, project.title
                ),
                NotificationType::PaymentProcessing,
                json!({ "transaction_id": transaction.id, "project_id": project.id }),
            )
            .await
        {
            tracing::warn!("Failed to emit processing notification: {}", e);
        }

        tracing::info!(
            "Transaction {} created for project {} (external_id {})",
            transaction.id,
            project.id,
            external_id
        );

        Ok(InitiateOutcome {
            transaction,
            jobs_to_create,
            message,
            checkout_url,
        })
    }

    /// Webhook entry point. Never fails the webhook sender: a missing
    /// transaction returns `None` and is only logged.
    ///
    /// Idempotency is a single conditional update on `status = 'pending'`,
    /// so two racing deliveries for one external_id apply funding exactly
    /// once; the loser sees the already-settled row and changes nothing.
    pub async fn reconcile(
        &self,
        external_id: &str,
        gateway_ref: &str,
        status: &str,
        amount: Option<i64>,
    ) -> Result<Option<TransactionRecord>> {
        let Ok(external_id) = Uuid::parse_str(external_id) else {
            tracing::warn!("Webhook carried malformed external_id: {}", external_id);
            return Ok(None);
        };

        let Some(existing) = sqlx::query_as::<_, TransactionRecord>(
            r#"SELECT * FROM transactions WHERE external_id = $1"#,
        )
        .bind(external_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        else {
            tracing::warn!("Transaction not found for external_id: {}", external_id);
            return Ok(None);
        };

        if let Some(amount) = amount {
            if amount != existing.amount {
                tracing::warn!(
                    "Webhook amount {} differs from recorded {} for tx {}",
                    amount,
                    existing.amount,
                    existing.id
                );
            }
        }

        if !status.eq_ignore_ascii_case("SUCCESSFUL") {
            return self.reconcile_failure(existing).await.map(Some);
        }

        let mut db_tx = self
            .db_pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(completed) = sqlx::query_as::<_, TransactionRecord>(
            r#"
            UPDATE transactions
            SET status = 'completed',
                gateway_ref = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE external_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(gateway_ref)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        else {
            tracing::info!("Transaction {} already processed", existing.id);
            return Ok(Some(existing));
        };

        // funding update shares the transaction with the status flip so a
        // crash can't complete the payment without crediting the project
        let project = sqlx::query_as::<_, ProjectRecord>(
            r#"
            UPDATE projects
            SET current_funding = current_funding + $2,
                backers_count = backers_count + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(completed.project_id)
        .bind(completed.amount)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let previous_funding = project.current_funding - completed.amount;
        let milestone = milestone_crossed(
            progress_percentage(previous_funding, project.funding_goal),
            project.progress_percentage(),
        );

        let project = if project.current_funding >= project.funding_goal {
            sqlx::query_as::<_, ProjectRecord>(
                r#"
                UPDATE projects SET status = 'funded', updated_at = NOW()
                WHERE id = $1 AND status = 'active'
                RETURNING *
                "#,
            )
            .bind(project.id)
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .unwrap_or(project)
        } else {
            project
        };

        db_tx
            .commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            "Transaction {} completed: {} job(s), project {} at {:.2}%",
            completed.id,
            completed.jobs_created,
            project.id,
            project.progress_percentage()
        );

        self.notify_completion(&completed, &project, milestone).await;

        Ok(Some(completed))
    }

    async fn reconcile_failure(&self, existing: TransactionRecord) -> Result<TransactionRecord> {
        let Some(failed) = sqlx::query_as::<_, TransactionRecord>(
            r#"
            UPDATE transactions SET status = 'failed', updated_at = NOW()
            WHERE external_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(existing.external_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        else {
            tracing::info!("Transaction {} already processed", existing.id);
            return Ok(existing);
        };

        tracing::info!("Transaction {} failed", failed.id);

        let project_title = self.project_title(failed.project_id).await;
        if let Err(e) = self
            .notifications
            .emit(
                failed.backer_id,
                "Payment Failed",
                &format!("Your payment for **{}** failed. Try again.", project_title),
                NotificationType::PaymentFailed,
                json!({ "transaction_id": failed.id, "project_id": failed.project_id }),
            )
            .await
        {
            tracing::warn!("Failed to emit payment-failed notification: {}", e);
        }

        Ok(failed)
    }

    async fn notify_completion(
        &self,
        transaction: &TransactionRecord,
        project: &ProjectRecord,
        milestone: Option<u32>,
    ) {
        let backer = self.user(transaction.backer_id).await;
        let entrepreneur = self.user(project.entrepreneur_id).await;
        let jobs = transaction.jobs_created;

        if let Some(backer) = &backer {
            if let Err(e) = self
                .notifications
                .emit(
                    backer.id,
                    "Payment Confirmed!",
                    &format!(
                        "Your RWF {} backed **{}** and created {} job(s)!",
                        transaction.amount, project.title, jobs
                    ),
                    NotificationType::PaymentConfirmed,
                    json!({ "project_id": project.id, "jobs": jobs }),
                )
                .await
            {
                tracing::warn!("Failed to emit backer confirmation: {}", e);
            }
        }

        if let Some(entrepreneur) = &entrepreneur {
            let backer_name = backer
                .as_ref()
                .map(|b| b.full_name.as_str())
                .unwrap_or("A backer");

            if let Err(e) = self
                .notifications
                .emit(
                    entrepreneur.id,
                    &format!("New Funding: {} Job(s) Created!", jobs),
                    &format!(
                        "{} backed your project **{}** with RWF {}. {} job(s) created!",
                        backer_name, project.title, transaction.amount, jobs
                    ),
                    NotificationType::FundingReceived,
                    json!({ "project_id": project.id, "amount": transaction.amount, "jobs": jobs }),
                )
                .await
            {
                tracing::warn!("Failed to emit funding notification: {}", e);
            }

            if let Some(percentage) = milestone {
                if let Err(e) = self
                    .notifications
                    .emit(
                        entrepreneur.id,
                        &format!("Milestone: {}% Funded!", percentage),
                        &format!(
                            "Your project **{}** is now {}% funded. Keep going!",
                            project.title, percentage
                        ),
                        NotificationType::MilestoneReached,
                        json!({ "project_id": project.id, "percentage": percentage }),
                    )
                    .await
                {
                    tracing::warn!("Failed to emit milestone notification: {}", e);
                }
            }

            if project.status == ProjectStatus::Funded {
                if let Err(e) = self
                    .notifications
                    .emit(
                        entrepreneur.id,
                        "Goal Reached!",
                        &format!(
                            "**{}** reached its RWF {} goal and is now fully funded!",
                            project.title, project.funding_goal
                        ),
                        NotificationType::ProjectFunded,
                        json!({ "project_id": project.id }),
                    )
                    .await
                {
                    tracing::warn!("Failed to emit project-funded notification: {}", e);
                }
            }
        }

        // emails are fire-and-forget; Mailer swallows its own failures
        if let Some(backer) = &backer {
            self.mailer
                .send(
                    &backer.email,
                    "Your payment is confirmed!",
                    &format!(
                        "Your RWF {} contribution to {} created {} job(s). Thank you!",
                        transaction.amount, project.title, jobs
                    ),
                )
                .await;
        }
        if let Some(entrepreneur) = &entrepreneur {
            self.mailer
                .send(
                    &entrepreneur.email,
                    &format!("New Funding: {} Job(s) Created!", jobs),
                    &format!(
                        "{} is now RWF {} of RWF {} funded.",
                        project.title, project.current_funding, project.funding_goal
                    ),
                )
                .await;
        }
    }

    pub async fn list_by_backer(
        &self,
        backer_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BackerTransaction>> {
        let transactions = sqlx::query_as::<_, BackerTransaction>(
            r#"
            SELECT t.id, t.amount, t.jobs_created, t.status, t.project_id,
                   p.title AS project_title, t.created_at
            FROM transactions t
            JOIN projects p ON p.id = t.project_id
            WHERE t.backer_id = $1
            ORDER BY t.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(backer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(transactions)
    }

    pub async fn list_by_project(
        &self,
        project_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionRecord>> {
        let transactions = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT * FROM transactions
            WHERE project_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(transactions)
    }

    async fn mark_failed(&self, transaction_id: i32) -> Result<()> {
        sqlx::query(
            r#"UPDATE transactions SET status = 'failed', updated_at = NOW() WHERE id = $1"#,
        )
        .bind(transaction_id)
        .execute(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn user(&self, user_id: i32) -> Option<UserRecord> {
        match sqlx::query_as::<_, UserRecord>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await
        {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("User lookup {} failed during notification: {}", user_id, e);
                None
            }
        }
    }

    async fn project_title(&self, project_id: i32) -> String {
        sqlx::query_scalar::<_, String>(r#"SELECT title FROM projects WHERE id = $1"#)
            .bind(project_id)
            .fetch_optional(&self.db_pool)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "your project".to_string())
    }
}

/// Funding progress as a percentage of the goal, rounded to two decimals.
pub fn progress_percentage(current_funding: i64, funding_goal: i64) -> f64 {
    if funding_goal <= 0 {
        return 0.0;
    }
    let pct = current_funding as f64 / funding_goal as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Highest milestone bracket newly entered between two progress readings.
///
/// A single contribution that jumps several brackets reports only the
/// highest one (10% -> 100% reports 100, not 25/50/75 as well).
pub fn milestone_crossed(previous_pct: f64, new_pct: f64) -> Option<u32> {
    let new_bracket = bracket(new_pct)?;
    match bracket(previous_pct) {
        Some(previous_bracket) if previous_bracket >= new_bracket => None,
        _ => Some(new_bracket),
    }
}

fn bracket(pct: f64) -> Option<u32> {
    MILESTONE_BRACKETS.into_iter().find(|b| pct >= f64::from(*b))
}

fn valid_msisdn(phone: &str) -> bool {
    if let Some(rest) = phone.strip_prefix("+250") {
        return rest.len() == 9 && rest.chars().all(|c| c.is_ascii_digit());
    }
    phone.len() == 10 && phone.starts_with('0') && phone.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_to_two_decimals() {
        assert_eq!(progress_percentage(50_000, 200_000), 25.0);
        assert_eq!(progress_percentage(1, 3), 33.33);
        assert_eq!(progress_percentage(2, 3), 66.67);
        assert_eq!(progress_percentage(0, 200_000), 0.0);
    }

    #[test]
    fn progress_of_zero_goal_is_zero() {
        assert_eq!(progress_percentage(10_000, 0), 0.0);
    }

    #[test]
    fn first_bracket_crossing_reports_25() {
        assert_eq!(milestone_crossed(10.0, 30.0), Some(25));
        assert_eq!(milestone_crossed(0.0, 25.0), Some(25));
    }

    #[test]
    fn no_milestone_within_same_bracket() {
        assert_eq!(milestone_crossed(30.0, 45.0), None);
        assert_eq!(milestone_crossed(10.0, 20.0), None);
        assert_eq!(milestone_crossed(100.0, 120.0), None);
    }

    #[test]
    fn large_jump_reports_only_highest_bracket() {
        assert_eq!(milestone_crossed(40.0, 100.0), Some(100));
        assert_eq!(milestone_crossed(10.0, 100.0), Some(100));
        assert_eq!(milestone_crossed(60.0, 80.0), Some(75));
    }

    #[test]
    fn overshoot_past_goal_still_reports_100() {
        assert_eq!(milestone_crossed(80.0, 150.0), Some(100));
    }

    #[test]
    fn msisdn_formats() {
        assert!(valid_msisdn("+250788123456"));
        assert!(valid_msisdn("0788123456"));
        assert!(!valid_msisdn("+25078812345"));
        assert!(!valid_msisdn("788123456"));
        assert!(!valid_msisdn("+2507881234ab"));
    }
}
