use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::models::{PaymentMethod, TransactionRecord, UserRole};
use crate::funding::manager::{BackerTransaction, InitiateRequest};
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub project_id: i32,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentInitiateResponse {
    pub transaction_id: i32,
    pub external_id: Uuid,
    pub jobs_to_create: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Inbound payload from the payment provider's webhook. Signature
/// verification happens upstream of this handler.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(rename = "financialTransactionId", default)]
    pub financial_transaction_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentInitiateResponse>)> {
    user.require_role(UserRole::Backer, "back projects")?;

    let outcome = state
        .funding
        .initiate(
            &user.0,
            InitiateRequest {
                project_id: req.project_id,
                amount: req.amount,
                payment_method: req.payment_method,
                phone: req.phone,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentInitiateResponse {
            transaction_id: outcome.transaction.id,
            external_id: outcome.transaction.external_id,
            jobs_to_create: outcome.jobs_to_create,
            message: outcome.message,
            checkout_url: outcome.checkout_url,
        }),
    ))
}

/// Provider callbacks are always acknowledged: reconciliation failures are
/// logged, retried by the provider, and never turned into error responses.
pub async fn momo_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> Json<serde_json::Value> {
    let amount = payload.amount.as_deref().and_then(|a| a.parse::<i64>().ok());

    match state
        .funding
        .reconcile(
            &payload.external_id,
            &payload.financial_transaction_id,
            &payload.status,
            amount,
        )
        .await
    {
        Ok(Some(transaction)) => {
            tracing::debug!(
                "Webhook reconciled tx {} -> {:?}",
                transaction.id,
                transaction.status
            );
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Webhook reconciliation failed: {}", e);
        }
    }

    Json(json!({ "acknowledged": true }))
}

pub async fn my_transactions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<BackerTransaction>>> {
    let transactions = state
        .funding
        .list_by_backer(user.0.id, page.limit.clamp(1, 100), page.offset.max(0))
        .await?;

    Ok(Json(transactions))
}

pub async fn project_transactions(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<TransactionRecord>>> {
    // 404 for unknown projects instead of an empty list
    state.projects.get_by_id(project_id).await?;

    let transactions = state
        .funding
        .list_by_project(project_id, page.limit.clamp(1, 100), page.offset.max(0))
        .await?;

    Ok(Json(transactions))
}
