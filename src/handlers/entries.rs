use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::dto::{
    parse_date, parse_or, ApiResponse, CreateEntryRequest, ListEntriesQuery, Pagination,
    RecentQuery,
};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::models::entry::{Entry, EntryContent, EntryView};
use crate::services::analytics::window;
use crate::store::DateRange;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_RECENT_DAYS: i64 = 7;
const MAX_RECENT_DAYS: i64 = 366;

type EntryResponse = Json<ApiResponse<EntryView>>;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn not_found() -> AppError {
    AppError::NotFound("Entry not found".into())
}

/// A malformed id cannot name an entry the caller owns.
fn entry_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

fn views(entries: Vec<Entry>) -> Vec<EntryView> {
    entries.into_iter().map(EntryView::from).collect()
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<ListEntriesQuery>,
) -> AppResult<Json<ApiResponse<Vec<EntryView>>>> {
    let page = parse_or(q.page.as_deref(), 1i64).max(1);
    let limit = parse_or(q.limit.as_deref(), DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let range = DateRange {
        start: q.start_date.as_deref().and_then(|d| parse_date(d).ok()),
        end: q.end_date.as_deref().and_then(|d| parse_date(d).ok()),
    };

    let offset = page.saturating_sub(1).saturating_mul(limit);

    let (entries, total) = state
        .store
        .page_entries(auth.id, range, offset, limit)
        .await?;

    Ok(Json(
        ApiResponse::ok(views(entries)).with_pagination(Pagination::new(total, page, limit)),
    ))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(body): AppJson<CreateEntryRequest>,
) -> AppResult<(StatusCode, EntryResponse)> {
    let date = match body.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };
    let content = body.content.validated()?;

    let entry = state.store.insert_entry(auth.id, date, &content).await?;

    tracing::info!(user_id = %auth.id, entry_id = %entry.id, %date, "Entry created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(entry.into()))))
}

pub async fn today_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<EntryResponse> {
    let entry = state.store.get_or_create_entry(auth.id, today()).await?;
    Ok(Json(ApiResponse::ok(entry.into())))
}

pub async fn recent_entries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<RecentQuery>,
) -> AppResult<Json<ApiResponse<Vec<EntryView>>>> {
    let days = parse_or(q.days.as_deref(), DEFAULT_RECENT_DAYS);
    let days = if days < 1 { DEFAULT_RECENT_DAYS } else { days.min(MAX_RECENT_DAYS) };

    let mut entries = state
        .store
        .list_entries(auth.id, window(today(), days))
        .await?;
    entries.reverse();

    Ok(Json(ApiResponse::ok(views(entries))))
}

pub async fn entry_by_date(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(raw): Path<String>,
) -> AppResult<Json<ApiResponse<Option<EntryView>>>> {
    let date = parse_date(&raw)?;
    let entry = state.store.find_entry_by_date(auth.id, date).await?;
    Ok(Json(ApiResponse::ok(entry.map(EntryView::from))))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(raw): Path<String>,
) -> AppResult<EntryResponse> {
    let entry = state
        .store
        .find_entry(auth.id, entry_id(&raw)?)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::ok(entry.into())))
}

/// Full replace of the entry's content, validated like a create.
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(raw): Path<String>,
    AppJson(content): AppJson<EntryContent>,
) -> AppResult<EntryResponse> {
    let id = entry_id(&raw)?;
    let content = content.validated()?;

    let entry = state
        .store
        .replace_entry_content(auth.id, id, &content)
        .await?
        .ok_or_else(not_found)?;

    tracing::debug!(user_id = %auth.id, entry_id = %id, "Entry updated");
    Ok(Json(ApiResponse::ok(entry.into())))
}

/// Overlay the given top-level fields onto the stored entry.
pub async fn autosave_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(raw): Path<String>,
    AppJson(patch): AppJson<Map<String, Value>>,
) -> AppResult<EntryResponse> {
    let id = entry_id(&raw)?;
    let entry = state
        .store
        .patch_entry_content(auth.id, id, patch)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse::ok(entry.into()).with_message("Auto-saved")))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(raw): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let id = entry_id(&raw)?;
    if !state.store.delete_entry(auth.id, id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %auth.id, entry_id = %id, "Entry deleted");
    Ok(Json(ApiResponse::message("Entry deleted")))
}
