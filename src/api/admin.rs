use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::projects::ProjectResponse;
use crate::auth::CurrentUser;
use crate::db::admin::PlatformStats;
use crate::db::models::{TransactionRecord, UserRecord};
use crate::db::projects::ProjectFilter;
use crate::error::Result;
use crate::AppState;

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

pub async fn platform_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<PlatformStats>> {
    user.require_admin()?;

    let stats = state.admin.stats().await?;
    Ok(Json(stats))
}

// unlike the public listing this one includes drafts
pub async fn list_all_projects(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<ProjectResponse>>> {
    user.require_admin()?;

    let projects = state
        .projects
        .list(ProjectFilter {
            sector: None,
            status: None,
            limit: page.limit.clamp(1, 200),
            offset: page.offset.max(0),
        })
        .await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

pub async fn list_all_transactions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<TransactionRecord>>> {
    user.require_admin()?;

    let transactions = state
        .admin
        .list_transactions(page.limit.clamp(1, 200), page.offset.max(0))
        .await?;

    Ok(Json(transactions))
}

pub async fn list_all_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<UserRecord>>> {
    user.require_admin()?;

    let users = state
        .admin
        .list_users(page.limit.clamp(1, 200), page.offset.max(0))
        .await?;

    Ok(Json(users))
}
