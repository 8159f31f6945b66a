use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::auth;
use crate::config::Config;
use crate::error;
use crate::handlers;
use crate::AppState;

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/health/ready", get(handlers::health::readyz))
        .merge(auth_routes);

    let protected_routes = Router::new()
        // Account
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/profile", put(handlers::auth::update_profile))
        .route("/api/auth/password", put(handlers::auth::update_password))
        // Entries
        .route(
            "/api/entries",
            get(handlers::entries::list_entries).post(handlers::entries::create_entry),
        )
        .route("/api/entries/today", get(handlers::entries::today_entry))
        .route("/api/entries/recent", get(handlers::entries::recent_entries))
        .route("/api/entries/date/:date", get(handlers::entries::entry_by_date))
        .route(
            "/api/entries/:id",
            get(handlers::entries::get_entry)
                .put(handlers::entries::update_entry)
                .delete(handlers::entries::delete_entry),
        )
        .route(
            "/api/entries/:id/autosave",
            patch(handlers::entries::autosave_entry),
        )
        // Analytics
        .route("/api/analytics/summary", get(handlers::analytics::summary))
        .route(
            "/api/analytics/mood-trends",
            get(handlers::analytics::mood_trends),
        )
        .route(
            "/api/analytics/energy-patterns",
            get(handlers::analytics::energy_patterns),
        )
        .route(
            "/api/analytics/activity-heatmap",
            get(handlers::analytics::activity_heatmap),
        )
        .route(
            "/api/analytics/weekly-report",
            get(handlers::analytics::weekly_report),
        )
        // User data
        .route(
            "/api/users/preferences",
            get(handlers::users::get_preferences).put(handlers::users::update_preferences),
        )
        .route("/api/users/export", get(handlers::users::export_data))
        .route("/api/users/account", delete(handlers::users::delete_account))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_api,
        ))
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::attach_detail,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = std::iter::once(&config.client_url)
        .chain(config.cors_extra_origins.iter())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": format!("Not Found - {}", uri.path()),
        })),
    )
}
