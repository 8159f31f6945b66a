use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::auth::middleware::AuthUser;
use crate::dto::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::models::entry::Entry;
use crate::models::user::Preferences;
use crate::store::DateRange;
use crate::AppState;

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

#[derive(Debug, Serialize)]
struct ExportedUser<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Export<'a> {
    user: ExportedUser<'a>,
    entries: &'a [Entry],
}

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<Preferences>>> {
    let user = state
        .store
        .find_user(auth.id)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(ApiResponse::ok(user.preferences.0)))
}

/// Replaces the whole preferences object.
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(body): AppJson<Value>,
) -> AppResult<Json<ApiResponse<Preferences>>> {
    let Value::Object(preferences) = body else {
        return Err(AppError::Validation("Preferences must be an object".into()));
    };

    let user = state
        .store
        .set_preferences(auth.id, &preferences)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(ApiResponse::ok(user.preferences.0)))
}

/// Every entry the user owns as a downloadable JSON document.
pub async fn export_data(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let user = state
        .store
        .find_user(auth.id)
        .await?
        .ok_or_else(user_not_found)?;
    let entries = state.store.list_entries(auth.id, DateRange::all()).await?;

    let body = serde_json::to_string_pretty(&Export {
        user: ExportedUser {
            name: &user.name,
            email: &user.email,
        },
        entries: &entries,
    })
    .map_err(anyhow::Error::from)?;

    let filename = format!("mindful-export-{}.json", Utc::now().timestamp_millis());
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(anyhow::Error::from)?,
    );

    tracing::info!(user_id = %auth.id, entries = entries.len(), "Data exported");
    Ok((headers, body))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !state.store.delete_user(auth.id).await? {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %auth.id, "Account deleted");
    Ok(Json(ApiResponse::message("Account deleted")))
}
