use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::PasswordHashing,
        repo::{PgUserRepo, UserRepo},
        services::AuthService,
    },
    config::AppConfig,
    investor::repo::{ApplicationRepo, PgApplicationRepo},
    portal::repo::{PgPortalRepo, PortalRepo},
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub applications: Arc<dyn ApplicationRepo>,
    pub portal: Arc<dyn PortalRepo>,
    pub auth: AuthService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let users = Arc::new(PgUserRepo::new(db.clone())) as Arc<dyn UserRepo>;
        let applications = Arc::new(PgApplicationRepo::new(db.clone())) as Arc<dyn ApplicationRepo>;
        let portal = Arc::new(PgPortalRepo::new(db.clone())) as Arc<dyn PortalRepo>;

        Self::from_parts(db, config, users, applications, portal)
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        applications: Arc<dyn ApplicationRepo>,
        portal: Arc<dyn PortalRepo>,
    ) -> anyhow::Result<Self> {
        let auth = AuthService::new(
            users.clone(),
            applications.clone(),
            JwtKeys::new(&config.jwt)?,
            PasswordHashing::new(config.password)?,
        );
        Ok(Self {
            db,
            config,
            users,
            applications,
            portal,
            auth,
        })
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.keys().clone()
    }
}
