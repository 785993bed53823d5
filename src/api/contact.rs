use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::models::ContactMessageRecord;
use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn create_contact_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactMessageRecord>)> {
    if req.name.trim().is_empty() || req.subject.trim().is_empty() || req.message.trim().is_empty()
    {
        return Err(AppError::Validation(
            "Name, subject and message are required".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }

    let record = state
        .contact
        .create(
            req.name.trim(),
            req.email.trim(),
            req.phone.as_deref(),
            req.subject.trim(),
            &req.message,
        )
        .await?;

    // best-effort auto-reply; message is already stored either way
    state
        .mailer
        .send(
            &record.email,
            "We received your message",
            &format!(
                "Hi {},\n\nThank you for reaching out. We will get back to you within 24 hours.",
                record.name
            ),
        )
        .await;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_contact_messages(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<ContactMessageRecord>>> {
    user.require_admin()?;

    let messages = state
        .contact
        .list(page.limit.clamp(1, 200), page.offset.max(0))
        .await?;

    Ok(Json(messages))
}

pub async fn mark_contact_message_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(message_id): Path<i32>,
) -> Result<StatusCode> {
    user.require_admin()?;

    let found = state.contact.mark_read(message_id).await?;
    if !found {
        return Err(AppError::NotFound("Contact message".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
