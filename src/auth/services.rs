use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenVerdict,
        dto::{ChangePasswordRequest, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::PasswordHashing,
        repo::{DuplicateEmail, UserRepo},
        repo_types::{NewUser, Role, User, UserStatus},
    },
    error::{error_response, internal_response},
    investor::{repo::ApplicationRepo, repo_types::ApplicationStatus},
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `None` for absent or whitespace-only input.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Outcomes of the authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    MissingFields(&'static str),
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Token is required")]
    MissingToken,
    #[error("Please provide a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    WeakPassword,
    #[error("An account with this email already exists")]
    AlreadyExists,
    #[error("A valid approval token is required to register")]
    ApprovalRequired,
    #[error("Email or password is incorrect")]
    InvalidCredentials,
    #[error("Your account is not active. Please contact support.")]
    AccountInactive,
    #[error("Token is invalid")]
    InvalidToken,
    #[error("Your session has expired. Please login again.")]
    TokenExpired,
    #[error("User account not found")]
    UserNotFound,
    #[error("Current password is incorrect")]
    InvalidPassword,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingFields(_)
            | AuthError::MissingCredentials
            | AuthError::MissingToken
            | AuthError::InvalidEmail
            | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
            AuthError::AlreadyExists => StatusCode::CONFLICT,
            AuthError::ApprovalRequired | AuthError::AccountInactive => StatusCode::FORBIDDEN,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AuthError::MissingFields(_)
            | AuthError::MissingCredentials
            | AuthError::MissingToken
            | AuthError::InvalidEmail
            | AuthError::WeakPassword => "validation_error",
            AuthError::AlreadyExists => "conflict",
            AuthError::ApprovalRequired => "authorization_error",
            AuthError::InvalidCredentials | AuthError::AccountInactive | AuthError::InvalidPassword => {
                "authentication_error"
            }
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::UserNotFound => "not_found",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Internal(e) => internal_response(&e, "Unable to complete the request. Please try again."),
            other => error_response(other.status(), other.category(), other.to_string()),
        }
    }
}

/// A freshly issued session token together with the user it belongs to.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Registration, login, token verification and password change.
///
/// All collaborators are injected; the service holds no mutable state.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    applications: Arc<dyn ApplicationRepo>,
    keys: JwtKeys,
    passwords: PasswordHashing,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        applications: Arc<dyn ApplicationRepo>,
        keys: JwtKeys,
        passwords: PasswordHashing,
    ) -> Self {
        Self {
            users,
            applications,
            keys,
            passwords,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AuthError> {
        let (Some(email), Some(password), Some(first_name), Some(last_name), Some(approval_token)) = (
            present(req.email),
            present(req.password),
            present(req.first_name),
            present(req.last_name),
            present(req.approval_token),
        ) else {
            return Err(AuthError::MissingFields(
                "Email, password, first name, last name, and approval token are required",
            ));
        };

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            warn!(email = %email, "register invalid email");
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        self.check_approval(&approval_token, &email).await?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = self.passwords.hash_async(password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
                role: Role::Investor,
                status: UserStatus::Active,
            })
            .await
            .map_err(|e| match e.downcast_ref::<DuplicateEmail>() {
                Some(_) => AuthError::AlreadyExists,
                None => AuthError::Internal(e),
            })?;

        let token = self.keys.sign(user.id, &user.email, user.role)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(AuthSession { token, user })
    }

    /// The approval token is the id of an approved application filed under the same email.
    async fn check_approval(&self, approval_token: &str, email: &str) -> Result<(), AuthError> {
        let Ok(application_id) = Uuid::parse_str(approval_token.trim()) else {
            warn!(email = %email, "register with malformed approval token");
            return Err(AuthError::ApprovalRequired);
        };
        match self.applications.find_by_id(application_id).await? {
            Some(app)
                if app.status == ApplicationStatus::Approved
                    && app.email.eq_ignore_ascii_case(email) =>
            {
                Ok(())
            }
            Some(app) => {
                warn!(%application_id, status = app.status.as_str(), "approval token not usable for this email");
                Err(AuthError::ApprovalRequired)
            }
            None => {
                warn!(%application_id, "approval token does not match any application");
                Err(AuthError::ApprovalRequired)
            }
        }
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AuthError> {
        let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
            return Err(AuthError::MissingCredentials);
        };
        let email = normalize_email(&email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.passwords.verify_decoy_async(password).await?;
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .passwords
            .verify_async(password, user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active() {
            warn!(user_id = %user.id, status = user.status.as_str(), "login on inactive account");
            return Err(AuthError::AccountInactive);
        }

        // best-effort: a lost last_login update does not fail the login
        if let Err(e) = self.users.update_last_login(user.id).await {
            warn!(error = %e, user_id = %user.id, "update last_login failed");
        }

        let token = self.keys.sign(user.id, &user.email, user.role)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthSession { token, user })
    }

    /// Verifies the token and re-reads the account, so the result reflects
    /// current status rather than the state at issuance.
    pub async fn verify_token(&self, token: Option<String>) -> Result<User, AuthError> {
        let token = present(token).ok_or(AuthError::MissingToken)?;
        let claims = match self.keys.verify(token.trim()) {
            TokenVerdict::Valid(claims) => claims,
            TokenVerdict::Expired => return Err(AuthError::TokenExpired),
            TokenVerdict::Invalid => return Err(AuthError::InvalidToken),
        };

        let Some(user) = self.users.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "token for unknown user");
            return Err(AuthError::InvalidToken);
        };
        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }
        Ok(user)
    }

    pub async fn change_password(&self, req: ChangePasswordRequest) -> Result<(), AuthError> {
        let (Some(token), Some(current_password), Some(new_password)) = (
            present(req.token),
            present(req.current_password),
            present(req.new_password),
        ) else {
            return Err(AuthError::MissingFields(
                "Current password and new password are required",
            ));
        };
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let claims = match self.keys.verify(token.trim()) {
            TokenVerdict::Valid(claims) => claims,
            TokenVerdict::Expired => return Err(AuthError::TokenExpired),
            TokenVerdict::Invalid => return Err(AuthError::InvalidToken),
        };

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .passwords
            .verify_async(current_password, user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "change password with wrong current password");
            return Err(AuthError::InvalidPassword);
        }

        let new_hash = self.passwords.hash_async(new_password).await?;
        self.users.update_password_hash(user.id, &new_hash).await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
