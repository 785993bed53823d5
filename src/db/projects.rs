use sqlx::PgPool;

use crate::db::models::{ProjectRecord, ProjectStatus};
use crate::error::{AppError, Result};

pub struct CreateProject {
    pub title: String,
    pub description: String,
    pub sector: String,
    pub funding_goal: i64,
}

#[derive(Default)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub funding_goal: Option<i64>,
}

pub struct ProjectFilter {
    pub sector: Option<String>,
    pub status: Option<ProjectStatus>,
    pub limit: i64,
    pub offset: i64,
}

pub struct ProjectService {
    db_pool: PgPool,
    job_creation_rate: i64,
    campaign_duration_days: i64,
}

impl ProjectService {
    pub fn new(db_pool: PgPool, job_creation_rate: i64, campaign_duration_days: i64) -> Self {
        Self {
            db_pool,
            job_creation_rate,
            campaign_duration_days,
        }
    }

    pub async fn create(&self, entrepreneur_id: i32, input: CreateProject) -> Result<ProjectRecord> {
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        if input.funding_goal <= 0 {
            return Err(AppError::Validation("Funding goal must be positive".to_string()));
        }

        let job_goal = (input.funding_goal / self.job_creation_rate) as i32;
        let slug = self.unique_slug(&input.title, None).await?;

        let project = sqlx::query_as::<_, ProjectRecord>(
            r#"
            INSERT INTO projects (title, slug, description, sector, funding_goal, job_goal, entrepreneur_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(input.title.trim())
        .bind(&slug)
        .bind(&input.description)
        .bind(&input.sector)
        .bind(input.funding_goal)
        .bind(job_goal)
        .bind(entrepreneur_id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!("Project created: {} ({})", project.id, project.slug);
        Ok(project)
    }

    pub async fn get_by_id(&self, project_id: i32) -> Result<ProjectRecord> {
        sqlx::query_as::<_, ProjectRecord>(r#"SELECT * FROM projects WHERE id = $1"#)
            .bind(project_id)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Project".to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<ProjectRecord> {
        sqlx::query_as::<_, ProjectRecord>(r#"SELECT * FROM projects WHERE slug = $1"#)
            .bind(slug)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Project".to_string()))
    }

    pub async fn list(&self, filter: ProjectFilter) -> Result<Vec<ProjectRecord>> {
        let projects = sqlx::query_as::<_, ProjectRecord>(
            r#"
            SELECT * FROM projects
            WHERE ($1::TEXT IS NULL OR sector ILIKE '%' || $1 || '%')
              AND ($2::project_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.sector)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(projects)
    }

    pub async fn list_by_entrepreneur(&self, entrepreneur_id: i32) -> Result<Vec<ProjectRecord>> {
        let projects = sqlx::query_as::<_, ProjectRecord>(
            r#"SELECT * FROM projects WHERE entrepreneur_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(entrepreneur_id)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(projects)
    }

    // drafts only - a launched campaign's terms are locked in
    pub async fn update(
        &self,
        project_id: i32,
        entrepreneur_id: i32,
        input: UpdateProject,
    ) -> Result<ProjectRecord> {
        let existing = self.get_by_id(project_id).await?;
        if existing.entrepreneur_id != entrepreneur_id {
            return Err(AppError::Forbidden("Only the project owner can edit it".to_string()));
        }
        if existing.status != ProjectStatus::Draft {
            return Err(AppError::Validation("Only draft projects can be edited".to_string()));
        }
        if let Some(goal) = input.funding_goal {
            if goal <= 0 {
                return Err(AppError::Validation("Funding goal must be positive".to_string()));
            }
        }

        let slug = match &input.title {
            Some(title) => Some(self.unique_slug(title, Some(project_id)).await?),
            None => None,
        };
        let job_goal = input
            .funding_goal
            .map(|goal| (goal / self.job_creation_rate) as i32);

        let project = sqlx::query_as::<_, ProjectRecord>(
            r#"
            UPDATE projects
            SET title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                sector = COALESCE($5, sector),
                funding_goal = COALESCE($6, funding_goal),
                job_goal = COALESCE($7, job_goal),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(slug)
        .bind(input.description)
        .bind(input.sector)
        .bind(input.funding_goal)
        .bind(job_goal)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(project)
    }

    pub async fn launch(&self, project_id: i32, entrepreneur_id: i32) -> Result<ProjectRecord> {
        let existing = self.get_by_id(project_id).await?;
        if existing.entrepreneur_id != entrepreneur_id {
            return Err(AppError::Forbidden("Only the project owner can launch it".to_string()));
        }

        // conditional on status so a double launch can't reset the campaign window
        let launched = sqlx::query_as::<_, ProjectRecord>(
            r#"
            UPDATE projects
            SET status = 'active',
                launched_at = NOW(),
                ends_at = NOW() + make_interval(days => $2),
                updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(self.campaign_duration_days as i32)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Validation("Only draft projects can be launched".to_string()))?;

        tracing::info!("Project {} launched, campaign ends {:?}", launched.id, launched.ends_at);
        Ok(launched)
    }

    pub async fn delete(&self, project_id: i32, entrepreneur_id: i32) -> Result<()> {
        let existing = self.get_by_id(project_id).await?;
        if existing.entrepreneur_id != entrepreneur_id {
            return Err(AppError::Forbidden("Only the project owner can delete it".to_string()));
        }

        sqlx::query(r#"DELETE FROM projects WHERE id = $1"#)
            .bind(project_id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn unique_slug(&self, title: &str, exclude_id: Option<i32>) -> Result<String> {
        let base = slugify(title);
        let mut candidate = base.clone();
        let mut counter = 1;

        loop {
            let taken = sqlx::query_scalar::<_, i32>(
                r#"SELECT 1 FROM projects WHERE slug = $1 AND ($2::INTEGER IS NULL OR id <> $2) LIMIT 1"#,
            )
            .bind(&candidate)
            .bind(exclude_id)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .is_some();

            if !taken {
                return Ok(candidate);
            }
            candidate = format!("{}-{}", base, counter);
            counter += 1;
        }
    }
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    let slug = slug.trim_end_matches('-').to_string();
    // slug column is VARCHAR(220); leave room for a -N uniqueness suffix
    slug.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Eco Coffee"), "eco-coffee");
        assert_eq!(slugify("  Tech Hub – Kigali!  "), "tech-hub-kigali");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn slugify_collapses_runs_of_separators() {
        assert_eq!(slugify("a   b---c"), "a-b-c");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_truncates_long_titles() {
        let long = "x".repeat(400);
        assert_eq!(slugify(&long).len(), 200);
    }
}
