//! Request and response shapes shared by the handlers.
//!
//! Every success body is an [`ApiResponse`]; errors are rendered by
//! `AppError`. Query parameters arrive as raw strings and are parsed
//! leniently, falling back to defaults.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::entry::EntryContent;
use crate::models::user::{Preferences, UserProfile};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            pagination: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self { total, page, pages }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// POST /api/auth/register
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// POST /api/auth/login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// PUT /api/auth/profile. `avatar: null` clears the avatar, an absent key keeps it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub avatar: Option<Option<String>>,

    pub preferences: Option<Preferences>,
}

/// PUT /api/auth/password
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: UserProfile,
    pub token: String,
}

/// Distinguishes an explicit `null` from a missing key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Entries
// ============================================================================

/// POST /api/entries. Anything besides `date` is entry content.
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub date: Option<String>,
    #[serde(flatten)]
    pub content: EntryContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub days: Option<String>,
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<String>,
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Parse a query value, falling back to `default` when missing or malformed.
pub fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Calendar day in `yyyy-MM-dd` form. An RFC 3339 timestamp is accepted and
/// truncated to its date.
pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::message("Entry deleted")).unwrap();
        assert_eq!(body, json!({ "success": true, "message": "Entry deleted" }));
    }

    #[test]
    fn test_envelope_keeps_explicit_null_data() {
        let body = serde_json::to_value(ApiResponse::ok(None::<u8>)).unwrap();
        assert_eq!(body, json!({ "success": true, "data": null }));
    }

    #[test]
    fn test_pagination_pages_round_up() {
        assert_eq!(Pagination::new(21, 1, 10).pages, 3);
        assert_eq!(Pagination::new(20, 2, 10).pages, 2);
        assert_eq!(Pagination::new(0, 1, 10).pages, 0);
    }

    #[test]
    fn test_parse_or_is_lenient() {
        assert_eq!(parse_or(Some("3"), 1i64), 3);
        assert_eq!(parse_or(Some("three"), 1i64), 1);
        assert_eq!(parse_or::<i64>(None, 10), 10);
    }

    #[test]
    fn test_parse_date() {
        let d = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        assert_eq!(parse_date("2026-02-14").unwrap(), d);
        assert_eq!(parse_date("2026-02-14T09:30:00Z").unwrap(), d);
        assert!(matches!(parse_date("14/02/2026"), Err(AppError::Validation(_))));
        assert!(parse_date("2026-02-30").is_err());
    }

    #[test]
    fn test_avatar_null_differs_from_missing() {
        let cleared: UpdateProfileRequest = serde_json::from_value(json!({ "avatar": null })).unwrap();
        assert_eq!(cleared.avatar, Some(None));

        let untouched: UpdateProfileRequest = serde_json::from_value(json!({ "name": "Ada" })).unwrap();
        assert_eq!(untouched.avatar, None);
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "longenough".into(),
        };
        assert!(ok.validate().is_ok());

        let short = RegisterRequest {
            password: "short".into(),
            ..ok
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_create_request_splits_date_from_content() {
        let req: CreateEntryRequest = serde_json::from_value(json!({
            "date": "2026-01-05",
            "mood": 3,
            "gratitude": ["rain"]
        }))
        .unwrap();
        assert_eq!(req.date.as_deref(), Some("2026-01-05"));
        assert_eq!(req.content.trackers.mood, Some(3));
        assert_eq!(req.content.reflection.gratitude, vec!["rain".to_string()]);
    }
}
