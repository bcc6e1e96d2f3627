use axum::{extract::State, routing::get, Json, Router};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiJson, ApiPath, AppError},
    portal::{
        dto::{
            Dashboard, DashboardResponse, DealResponse, DealsResponse, Profile, ProfileResponse,
            ProfileUpdatedResponse, ReportsResponse, UpdateProfileRequest,
        },
        repo::{RECENT_REPORT_DAYS, REPORT_LIMIT},
    },
    state::AppState,
};

/// Every portal route takes `AuthUser`, so none runs without a verified token.
pub fn portal_routes() -> Router<AppState> {
    Router::new()
        .route("/portal/deals", get(list_deals))
        .route("/portal/deals/:id", get(get_deal))
        .route("/portal/reports", get(list_reports))
        .route("/portal/profile", get(get_profile).put(update_profile))
        .route("/portal/dashboard", get(dashboard))
}

#[instrument(skip_all)]
pub async fn list_deals(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Result<Json<DealsResponse>, AppError> {
    let deals = state.portal.list_active_deals().await?;
    Ok(Json(DealsResponse { deals }))
}

#[instrument(skip_all)]
pub async fn get_deal(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DealResponse>, AppError> {
    let deal = state
        .portal
        .find_deal(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Investment opportunity not found".into()))?;
    Ok(Json(DealResponse { deal }))
}

#[instrument(skip_all)]
pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Result<Json<ReportsResponse>, AppError> {
    let reports = state.portal.list_published_reports(REPORT_LIMIT).await?;
    Ok(Json(ReportsResponse { reports }))
}

#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User profile not found".into()))?;
    Ok(Json(ProfileResponse {
        profile: Profile::from(user),
    }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdatedResponse>, AppError> {
    let user = state
        .users
        .update_profile(identity.user_id, payload.into())
        .await?
        .ok_or_else(|| AppError::NotFound("Unable to update profile".into()))?;
    info!(user_id = %identity.user_id, "profile updated");
    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully",
        profile: Profile::from(user),
    }))
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User profile not found".into()))?;
    let since = OffsetDateTime::now_utc() - Duration::days(RECENT_REPORT_DAYS);
    let (active_deals, recent_reports) = tokio::try_join!(
        state.portal.count_active_deals(),
        state.portal.count_reports_since(since)
    )?;
    Ok(Json(DashboardResponse {
        dashboard: Dashboard {
            active_deals,
            recent_reports,
            member_since: user.created_at,
            last_login: user.last_login,
            user_name: format!("{} {}", user.first_name, user.last_name),
        },
    }))
}
