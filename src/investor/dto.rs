use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::investor::repo_types::{Application, ApplicationStatus};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub accreditation_status: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub message: &'static str,
    pub application_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

impl From<&Application> for StatusResponse {
    fn from(a: &Application) -> Self {
        Self {
            application_id: a.id,
            status: a.status,
            submitted_at: a.submitted_at,
            reviewed_at: a.reviewed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: Option<String>,
}

/// Full application as shown to administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
    pub city: String,
    pub state: String,
    pub accreditation_status: String,
    pub additional_info: Option<String>,
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

impl From<Application> for ApplicationView {
    fn from(a: Application) -> Self {
        Self {
            id: a.id,
            first_name: a.first_name,
            last_name: a.last_name,
            email: a.email,
            phone: a.phone,
            company: a.company,
            city: a.city,
            state: a.state,
            accreditation_status: a.accreditation_status,
            additional_info: a.additional_info,
            status: a.status,
            submitted_at: a.submitted_at,
            reviewed_at: a.reviewed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApplicationList {
    pub applications: Vec<ApplicationView>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub message: &'static str,
    pub application: ApplicationView,
}
