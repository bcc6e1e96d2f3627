use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{ProfileUpdate, Role, User},
    portal::repo::{Deal, DealSummary, Report},
};

#[derive(Debug, Serialize)]
pub struct DealsResponse {
    pub deals: Vec<DealSummary>,
}

#[derive(Debug, Serialize)]
pub struct DealResponse {
    pub deal: Deal,
}

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<User> for Profile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.role,
            phone: u.phone,
            company: u.company,
            city: u.city,
            state: u.state,
            member_since: u.created_at,
            last_login: u.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: &'static str,
    pub profile: Profile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(r: UpdateProfileRequest) -> Self {
        // names cannot be blanked out
        let name = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            first_name: name(r.first_name),
            last_name: name(r.last_name),
            phone: r.phone,
            company: r.company,
            city: r.city,
            state: r.state,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub active_deals: i64,
    pub recent_reports: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub user_name: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub dashboard: Dashboard,
}
