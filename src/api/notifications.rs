use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::models::NotificationRecord;
use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<NotificationRecord>>> {
    let notifications = state
        .notifications
        .list_for_user(
            user.0.id,
            query.unread_only,
            query.limit.clamp(1, 100),
            query.offset.max(0),
        )
        .await?;

    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(notification_id): Path<i32>,
) -> Result<StatusCode> {
    let found = state.notifications.mark_read(notification_id, user.0.id).await?;
    if !found {
        return Err(AppError::NotFound("Notification".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(notification_id): Path<i32>,
) -> Result<StatusCode> {
    let found = state.notifications.delete(notification_id, user.0.id).await?;
    if !found {
        return Err(AppError::NotFound("Notification".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
