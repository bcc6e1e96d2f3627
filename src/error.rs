//! JSON error responses shared by every layer.
//!
//! All failures leave the process as `{ "error": <category>, "message": <text> }`.
//! Internal errors carry their cause in response extensions; the
//! [`attach_internal_detail`] layer copies it into `detail` when the config
//! allows it.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn error_response(status: StatusCode, category: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: category,
        message: message.into(),
        detail: None,
    };
    (status, Json(body)).into_response()
}

/// Cause of a 500, kept out of the body until [`attach_internal_detail`] decides.
#[derive(Debug, Clone)]
struct InternalDetail {
    message: String,
    detail: String,
}

/// 500 with the cause logged and left out of the body.
pub fn internal_response(err: &anyhow::Error, message: &str) -> Response {
    error!(error = ?err, "internal error");
    let mut response = error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message);
    response.extensions_mut().insert(InternalDetail {
        message: message.to_string(),
        detail: format!("{err:#}"),
    });
    response
}

/// Response layer: rewrites internal errors with their `detail` when
/// `config.expose_internal_errors()` holds.
pub async fn attach_internal_detail(State(config): State<Arc<AppConfig>>, response: Response) -> Response {
    if !config.expose_internal_errors() {
        return response;
    }
    let Some(internal) = response.extensions().get::<InternalDetail>().cloned() else {
        return response;
    };
    let body = ErrorBody {
        error: "internal_error",
        message: internal.message,
        detail: Some(internal.detail),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Errors raised by resource handlers (portal, investor applications).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Conflict(msg) => error_response(StatusCode::CONFLICT, "conflict", msg),
            AppError::Internal(e) => internal_response(&e, "An internal error occurred"),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// `Json` extractor whose rejection is a JSON `validation_error`.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, middleware::map_response_with_state, routing::get, Router};
    use tower::ServiceExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400_with_category() {
        let response = AppError::Validation("Email is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["message"], "Email is required");
        assert!(json.get("detail").is_none());
    }

    #[tokio::test]
    async fn internal_error_hides_cause_by_default() {
        let response = AppError::Internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "internal_error");
        assert!(!json.to_string().contains("connection refused"));
    }

    async fn failing_route(environment: &str) -> serde_json::Value {
        let mut config = crate::testing::test_config();
        config.environment = environment.into();
        let app = Router::new()
            .route(
                "/boom",
                get(|| async { AppError::Internal(anyhow::anyhow!("connection refused")) }),
            )
            .layer(map_response_with_state(Arc::new(config), attach_internal_detail));
        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        body_json(response).await
    }

    #[tokio::test]
    async fn detail_follows_configured_environment() {
        let dev = failing_route("development").await;
        assert_eq!(dev["error"], "internal_error");
        assert_eq!(dev["message"], "An internal error occurred");
        assert_eq!(dev["detail"], "connection refused");

        let prod = failing_route("production").await;
        assert_eq!(prod["error"], "internal_error");
        assert!(prod.get("detail").is_none());
    }

    #[tokio::test]
    async fn non_internal_errors_pass_through_untouched() {
        let mut config = crate::testing::test_config();
        config.environment = "development".into();
        let app = Router::new()
            .route("/gone", get(|| async { AppError::NotFound("gone".into()) }))
            .layer(map_response_with_state(Arc::new(config), attach_internal_detail));
        let response = app
            .oneshot(Request::builder().uri("/gone").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["message"], "gone");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn conflict_and_not_found_statuses() {
        assert_eq!(
            AppError::Conflict("dup".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("gone".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
