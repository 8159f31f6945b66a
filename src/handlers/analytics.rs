use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::dto::{ApiResponse, PeriodQuery, YearQuery};
use crate::error::AppResult;
use crate::services::analytics::{
    self, EnergyPoint, HeatmapDay, MoodPoint, Period, Summary, WeeklyReport,
};
use crate::AppState;

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<Summary>>> {
    let period = Period::from_token(q.period.as_deref());
    let today = Utc::now().date_naive();
    let summary = analytics::summary(state.store.as_ref(), auth.id, period, today).await?;
    Ok(Json(ApiResponse::ok(summary)))
}

pub async fn mood_trends(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<Vec<MoodPoint>>>> {
    let period = Period::from_token(q.period.as_deref());
    let today = Utc::now().date_naive();
    let points = analytics::mood_trends(state.store.as_ref(), auth.id, period, today).await?;
    Ok(Json(ApiResponse::ok(points)))
}

pub async fn energy_patterns(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<Vec<EnergyPoint>>>> {
    let points = analytics::energy_patterns(state.store.as_ref(), auth.id).await?;
    Ok(Json(ApiResponse::ok(points)))
}

pub async fn activity_heatmap(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<YearQuery>,
) -> AppResult<Json<ApiResponse<Vec<HeatmapDay>>>> {
    let year = analytics::year_or_current(q.year.as_deref(), Utc::now().date_naive());
    let days = analytics::activity_heatmap(state.store.as_ref(), auth.id, year).await?;
    Ok(Json(ApiResponse::ok(days)))
}

pub async fn weekly_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<WeeklyReport>>> {
    let today = Utc::now().date_naive();
    let report = analytics::weekly(state.store.as_ref(), auth.id, today).await?;
    Ok(Json(ApiResponse::ok(report)))
}
