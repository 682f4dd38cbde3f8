use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::TransactionId;
use tillpoint_infra::{ListQuery, Page, ReportFilter, TransactionView};
use tillpoint_sales::LineRequest;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub items: Vec<LineRequest>,
}

/// Listing query string. Values are parsed leniently: anything that is not a
/// number falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListTransactionsParams {
    pub fn into_query(self) -> ListQuery {
        let number = |raw: &Option<String>| raw.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        ListQuery::new(
            number(&self.page),
            number(&self.limit),
            self.search,
            self.sort_by.as_deref(),
            self.order.as_deref(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ReportParams {
    /// Dates are whole days (`YYYY-MM-DD`, UTC); `end_date` is inclusive.
    pub fn into_filter(self) -> Result<ReportFilter, axum::response::Response> {
        let start_date = self
            .start_date
            .as_deref()
            .map(|raw| parse_day(raw, "start_date"))
            .transpose()?;
        let end_date = match self.end_date.as_deref() {
            Some(raw) => {
                let day = parse_day(raw, "end_date")?;
                Some(day.checked_add_days(Days::new(1)).unwrap_or(day))
            }
            None => None,
        };

        Ok(ReportFilter {
            start_date,
            end_date,
            limit: parse_count(self.limit.as_deref(), "limit")?,
            offset: parse_count(self.offset.as_deref(), "offset")?.unwrap_or(0),
        })
    }
}

fn parse_day(raw: &str, field: &str) -> Result<DateTime<Utc>, axum::response::Response> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| errors::validation_error(format!("{field} must be a date in YYYY-MM-DD format")))
}

fn parse_count(raw: Option<&str>, field: &str) -> Result<Option<u32>, axum::response::Response> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<u32>()
                .map_err(|_| errors::validation_error(format!("{field} must be a non-negative integer")))
        })
        .transpose()
}

pub fn parse_transaction_id(raw: &str) -> Result<TransactionId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::validation_error("invalid transaction ID"))
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

pub fn success<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> axum::response::Response {
    (
        status,
        Json(ApiResponse {
            success: true,
            message: message.into(),
            data,
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionView>,
    pub pagination: PaginationMeta,
}

impl From<Page<TransactionView>> for TransactionListResponse {
    fn from(page: Page<TransactionView>) -> Self {
        let pagination = PaginationMeta {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
            has_next: page.has_next(),
            has_prev: page.has_prev(),
        };
        Self {
            transactions: page.items,
            pagination,
        }
    }
}
