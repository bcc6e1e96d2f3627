use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => anyhow::bail!("unknown application status {other:?}"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
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
    pub status: String,
    pub submitted_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
}

/// Accredited investor application.
#[derive(Debug, Clone)]
pub struct Application {
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
    pub submitted_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = anyhow::Error;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            status: row.status.parse()?,
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            company: row.company,
            city: row.city,
            state: row.state,
            accreditation_status: row.accreditation_status,
            additional_info: row.additional_info,
            submitted_at: row.submitted_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
    pub city: String,
    pub state: String,
    pub accreditation_status: String,
    pub additional_info: Option<String>,
}
