use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileUpdate, User, UserRow};

/// Returned (inside `anyhow::Error`) by `UserRepo::create` when the email is taken.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

/// Credential store. Emails are compared case-insensitively.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    async fn update_last_login(&self, id: Uuid) -> anyhow::Result<()>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<Option<User>>;
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, status, \
                            phone, company, city, state, created_at, updated_at, last_login";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role, status)
            VALUES (lower($1), $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => anyhow::Error::new(DuplicateEmail),
            _ => anyhow::Error::new(e),
        })?;
        User::try_from(row)
    }

    async fn update_last_login(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($1, first_name),
                last_name  = COALESCE($2, last_name),
                phone      = COALESCE($3, phone),
                company    = COALESCE($4, company),
                city       = COALESCE($5, city),
                state      = COALESCE($6, state),
                updated_at = NOW()
            WHERE id = $7
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone)
        .bind(update.company)
        .bind(update.city)
        .bind(update.state)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }
}
