use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::investor::repo_types::{Application, ApplicationRow, ApplicationStatus, NewApplication};

/// Returned (inside `anyhow::Error`) when an application with the email already exists.
#[derive(Debug, thiserror::Error)]
#[error("application already exists for this email")]
pub struct DuplicateApplication;

#[async_trait]
pub trait ApplicationRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Application>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Application>>;
    async fn create(&self, app: NewApplication) -> anyhow::Result<Application>;
    async fn list(&self, status: Option<ApplicationStatus>) -> anyhow::Result<Vec<Application>>;
    async fn set_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> anyhow::Result<Option<Application>>;
}

const APPLICATION_COLUMNS: &str = "id, first_name, last_name, email, phone, company, city, state, \
                                   accreditation_status, additional_info, status, submitted_at, reviewed_at";

#[derive(Clone)]
pub struct PgApplicationRepo {
    db: PgPool,
}

impl PgApplicationRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ApplicationRepo for PgApplicationRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM investor_applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM investor_applications WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn create(&self, app: NewApplication) -> anyhow::Result<Application> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            INSERT INTO investor_applications (
                first_name, last_name, email, phone, company,
                city, state, accreditation_status, additional_info, status
            )
            VALUES ($1, $2, lower($3), $4, $5, $6, $7, $8, $9, 'pending')
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(&app.first_name)
        .bind(&app.last_name)
        .bind(&app.email)
        .bind(&app.phone)
        .bind(&app.company)
        .bind(&app.city)
        .bind(&app.state)
        .bind(&app.accreditation_status)
        .bind(&app.additional_info)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => anyhow::Error::new(DuplicateApplication),
            _ => anyhow::Error::new(e),
        })?;
        Application::try_from(row)
    }

    async fn list(&self, status: Option<ApplicationStatus>) -> anyhow::Result<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM investor_applications
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY submitted_at DESC
            "#
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            UPDATE investor_applications
            SET status = $1, reviewed_at = NOW()
            WHERE id = $2
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Application::try_from).transpose()
    }
}
