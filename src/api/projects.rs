use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::models::{NotificationType, ProjectRecord, ProjectStatus, UserRole};
use crate::db::projects::{CreateProject, ProjectFilter, UpdateProject};
use crate::error::{AppError, Result};
use crate::AppState;

/// Project row plus the derived fields every client view needs.
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: ProjectRecord,
    pub progress_percentage: f64,
    pub days_remaining: Option<i64>,
}

impl From<ProjectRecord> for ProjectResponse {
    fn from(project: ProjectRecord) -> Self {
        let progress_percentage = project.progress_percentage();
        let days_remaining = project.days_remaining();
        Self {
            project,
            progress_percentage,
            days_remaining,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub sector: String,
    pub funding_goal: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub funding_goal: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub sector: Option<String>,
    pub status: Option<ProjectStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    user.require_role(UserRole::Entrepreneur, "create projects")?;

    let project = state
        .projects
        .create(
            user.0.id,
            CreateProject {
                title: req.title,
                description: req.description,
                sector: req.sector,
                funding_goal: req.funding_goal,
            },
        )
        .await?;

    if let Err(e) = state
        .notifications
        .emit(
            user.0.id,
            "Project Created!",
            &format!("Your project **{}** is ready to edit and launch.", project.title),
            NotificationType::ProjectCreated,
            json!({ "project_id": project.id }),
        )
        .await
    {
        tracing::warn!("Failed to emit project-created notification: {}", e);
    }

    Ok((StatusCode::CREATED, Json(project.into())))
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<ProjectResponse>>> {
    let projects = state
        .projects
        .list(ProjectFilter {
            sector: query.sector,
            status: query.status,
            limit: query.limit.clamp(1, 100),
            offset: query.offset.max(0),
        })
        .await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

pub async fn my_projects(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<ProjectResponse>>> {
    let projects = state.projects.list_by_entrepreneur(user.0.id).await?;
    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

pub async fn get_project_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectResponse>> {
    let project = state.projects.get_by_slug(&slug).await?;
    Ok(Json(project.into()))
}

// owner-only view used by the edit screen
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(project_id): Path<i32>,
) -> Result<Json<ProjectResponse>> {
    let project = state.projects.get_by_id(project_id).await?;
    if project.entrepreneur_id != user.0.id && user.0.role != UserRole::Admin {
        return Err(AppError::Forbidden("Only the project owner can view this".to_string()));
    }
    Ok(Json(project.into()))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(project_id): Path<i32>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>> {
    let project = state
        .projects
        .update(
            project_id,
            user.0.id,
            UpdateProject {
                title: req.title,
                description: req.description,
                sector: req.sector,
                funding_goal: req.funding_goal,
            },
        )
        .await?;

    Ok(Json(project.into()))
}

pub async fn launch_project(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(project_id): Path<i32>,
) -> Result<Json<ProjectResponse>> {
    let project = state.projects.launch(project_id, user.0.id).await?;

    if let Err(e) = state
        .notifications
        .emit(
            user.0.id,
            "Project Launched!",
            &format!("**{}** is now live!", project.title),
            NotificationType::ProjectLaunched,
            json!({ "project_id": project.id }),
        )
        .await
    {
        tracing::warn!("Failed to emit project-launched notification: {}", e);
    }

    state
        .mailer
        .send(
            &user.0.email,
            &format!("Your project {} is LIVE!", project.title),
            &format!(
                "Your campaign is live and accepting backers until {}.",
                project
                    .ends_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            ),
        )
        .await;

    Ok(Json(project.into()))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(project_id): Path<i32>,
) -> Result<StatusCode> {
    state.projects.delete(project_id, user.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
