use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RegisterRequest, VerifyRequest, VerifyResponse,
        },
        extractors::{AuthUser, MaybeAuthUser},
        services::AuthError,
    },
    error::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let session = state.auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Account created successfully",
            user: PublicUser::from(&session.user),
            token: session.token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let session = state.auth.login(payload).await?;
    Ok(Json(AuthResponse {
        message: "Login successful",
        user: PublicUser::from(&session.user),
        token: session.token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AuthError> {
    let user = state.auth.verify_token(payload.token).await?;
    Ok(Json(VerifyResponse {
        valid: true,
        user: PublicUser::from(&user),
    }))
}

/// Tokens are not revoked server-side; the client discards its copy.
#[instrument(skip_all)]
pub async fn logout(MaybeAuthUser(identity): MaybeAuthUser) -> Json<MessageResponse> {
    if let Some(identity) = identity {
        info!(user_id = %identity.user_id, "user logged out");
    }
    Json(MessageResponse {
        message: "Logout successful",
    })
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.change_password(payload).await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

#[instrument(skip_all)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state.auth.current_user(identity.user_id).await?;
    Ok(Json(PublicUser::from(&user)))
}
