use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::{AdminOnly, Authorized},
        services::{is_valid_email, normalize_email, present},
    },
    error::{ApiJson, ApiPath, ApiQuery, AppError},
    investor::{
        dto::{
            ApplicationList, ApplicationView, ApplyRequest, ApplyResponse, ListQuery,
            ReviewRequest, ReviewResponse, StatusResponse,
        },
        repo::DuplicateApplication,
        repo_types::{ApplicationStatus, NewApplication},
    },
    state::AppState,
};

pub fn investor_routes() -> Router<AppState> {
    Router::new()
        .route("/investor/apply", post(apply))
        .route("/investor/status/:application_id", get(status))
        .route("/investor/applications", get(list_applications))
        .route("/investor/applications/:application_id/review", post(review))
}

#[instrument(skip(state, payload))]
pub async fn apply(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplyResponse>), AppError> {
    let (
        Some(first_name),
        Some(last_name),
        Some(email),
        Some(phone),
        Some(city),
        Some(us_state),
        Some(accreditation_status),
    ) = (
        present(payload.first_name),
        present(payload.last_name),
        present(payload.email),
        present(payload.phone),
        present(payload.city),
        present(payload.state),
        present(payload.accreditation_status),
    )
    else {
        return Err(AppError::Validation("Please fill in all required fields".into()));
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Please provide a valid email address".into()));
    }

    if state.applications.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "duplicate investor application");
        return Err(AppError::Conflict(
            "An application with this email already exists".into(),
        ));
    }

    let application = state
        .applications
        .create(NewApplication {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email,
            phone: phone.trim().to_string(),
            company: present(payload.company),
            city: city.trim().to_string(),
            state: us_state.trim().to_string(),
            accreditation_status: accreditation_status.trim().to_string(),
            additional_info: present(payload.additional_info),
        })
        .await
        .map_err(|e| match e.downcast_ref::<DuplicateApplication>() {
            Some(_) => AppError::Conflict("An application with this email already exists".into()),
            None => AppError::Internal(e),
        })?;

    info!(application_id = %application.id, "investor application submitted");
    Ok((
        StatusCode::CREATED,
        Json(ApplyResponse {
            message: "Application submitted successfully",
            application_id: application.id,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    ApiPath(application_id): ApiPath<Uuid>,
) -> Result<Json<StatusResponse>, AppError> {
    let application = state
        .applications
        .find_by_id(application_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No application found with this ID".into()))?;
    Ok(Json(StatusResponse::from(&application)))
}

#[instrument(skip(state, admin))]
pub async fn list_applications(
    State(state): State<AppState>,
    Authorized(admin, _): Authorized<AdminOnly>,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> Result<Json<ApplicationList>, AppError> {
    let applications = state.applications.list(q.status).await?;
    info!(admin_id = %admin.user_id, count = applications.len(), "applications listed");
    Ok(Json(ApplicationList {
        applications: applications.into_iter().map(ApplicationView::from).collect(),
    }))
}

#[instrument(skip(state, admin, payload))]
pub async fn review(
    State(state): State<AppState>,
    Authorized(admin, _): Authorized<AdminOnly>,
    ApiPath(application_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let decision = match payload.status.as_deref().map(str::trim) {
        Some("approved") => ApplicationStatus::Approved,
        Some("rejected") => ApplicationStatus::Rejected,
        _ => {
            return Err(AppError::Validation(
                "status must be \"approved\" or \"rejected\"".into(),
            ))
        }
    };

    let application = state
        .applications
        .set_status(application_id, decision)
        .await?
        .ok_or_else(|| AppError::NotFound("No application found with this ID".into()))?;

    info!(
        admin_id = %admin.user_id,
        %application_id,
        status = decision.as_str(),
        "investor application reviewed"
    );
    Ok(Json(ReviewResponse {
        message: "Application reviewed",
        application: ApplicationView::from(application),
    }))
}
