use axum::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Deal as shown in the listing.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DealSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub target_amount: Option<Decimal>,
    pub raised_amount: Option<Decimal>,
    pub minimum_investment: Option<Decimal>,
    pub status: String,
    pub launch_date: Option<Date>,
    pub close_date: Option<Date>,
    pub images: Option<serde_json::Value>,
    pub documents: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Deal with the extended detail fields.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub target_amount: Option<Decimal>,
    pub raised_amount: Option<Decimal>,
    pub minimum_investment: Option<Decimal>,
    pub expected_return: Option<String>,
    pub investment_timeline: Option<String>,
    pub risk_level: Option<String>,
    pub status: String,
    pub launch_date: Option<Date>,
    pub close_date: Option<Date>,
    pub images: Option<serde_json::Value>,
    pub documents: Option<serde_json::Value>,
    pub details: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Deal> for DealSummary {
    fn from(d: &Deal) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
            description: d.description.clone(),
            category: d.category.clone(),
            location: d.location.clone(),
            target_amount: d.target_amount,
            raised_amount: d.raised_amount,
            minimum_investment: d.minimum_investment,
            status: d.status.clone(),
            launch_date: d.launch_date,
            close_date: d.close_date,
            images: d.images.clone(),
            documents: d.documents.clone(),
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub file_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub const REPORT_LIMIT: i64 = 50;
pub const RECENT_REPORT_DAYS: i64 = 30;

/// Read side of the member portal: deals and published reports.
#[async_trait]
pub trait PortalRepo: Send + Sync {
    /// Deals with status `active`, latest launch first, undated last.
    async fn list_active_deals(&self) -> anyhow::Result<Vec<DealSummary>>;
    async fn find_deal(&self, id: Uuid) -> anyhow::Result<Option<Deal>>;
    async fn count_active_deals(&self) -> anyhow::Result<i64>;
    /// Reports with status `published`, newest first, at most `limit`.
    async fn list_published_reports(&self, limit: i64) -> anyhow::Result<Vec<Report>>;
    /// Published reports with `published_at` strictly after `since`.
    async fn count_reports_since(&self, since: OffsetDateTime) -> anyhow::Result<i64>;
}

#[derive(Clone)]
pub struct PgPortalRepo {
    db: PgPool,
}

impl PgPortalRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PortalRepo for PgPortalRepo {
    async fn list_active_deals(&self) -> anyhow::Result<Vec<DealSummary>> {
        let rows = sqlx::query_as::<_, DealSummary>(
            r#"
            SELECT id, title, description, category, location,
                   target_amount, raised_amount, minimum_investment,
                   status, launch_date, close_date, images, documents, created_at
            FROM deals
            WHERE status = 'active'
            ORDER BY launch_date DESC NULLS LAST
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_deal(&self, id: Uuid) -> anyhow::Result<Option<Deal>> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            SELECT id, title, description, category, location,
                   target_amount, raised_amount, minimum_investment,
                   expected_return, investment_timeline, risk_level,
                   status, launch_date, close_date, images, documents, details, created_at
            FROM deals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(deal)
    }

    async fn count_active_deals(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE status = 'active'")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn list_published_reports(&self, limit: i64) -> anyhow::Result<Vec<Report>> {
        let rows = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, title, type, content, file_url, published_at, created_at
            FROM reports
            WHERE status = 'published'
            ORDER BY published_at DESC NULLS LAST
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count_reports_since(&self, since: OffsetDateTime) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports WHERE status = 'published' AND published_at > $1",
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }
}
