use axum::{extract::State, http::StatusCode, Extension, Json};
use validator::Validate;

use crate::auth::{
    jwt::create_token,
    middleware::AuthUser,
    password::{hash_password, verify_password},
};
use crate::dto::{
    ApiResponse, AuthPayload, LoginRequest, RegisterRequest, UpdatePasswordRequest,
    UpdateProfileRequest,
};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::models::user::{merge_preferences, normalize_email, NewUser, User, UserProfile};
use crate::AppState;

fn issue(user: User, state: &AppState) -> AppResult<AuthPayload> {
    let token = create_token(user.id, &user.email, &state.config)?;
    Ok(AuthPayload {
        user: user.into(),
        token,
    })
}

async fn current_user(state: &AppState, auth: &AuthUser) -> AppResult<User> {
    state
        .store
        .find_user(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(mut body): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    body.name = body.name.trim().to_string();
    body.email = normalize_email(&body.email);
    body.validate()?;

    let user = state
        .store
        .insert_user(NewUser {
            name: body.name,
            email: body.email,
            password_hash: hash_password(&body.password)?,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(issue(user, &state)?))))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthPayload>>> {
    body.validate()?;
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let user = state
        .store
        .find_user_by_email(&normalize_email(&body.email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&body.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login failed");
        return Err(invalid());
    }

    Ok(Json(ApiResponse::ok(issue(user, &state)?)))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(body): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    body.validate()?;
    let mut user = current_user(&state, &auth).await?;

    if let Some(name) = body.name.map(|n| n.trim().to_string()) {
        if !name.is_empty() {
            user.name = name;
        }
    }
    if let Some(avatar) = body.avatar {
        user.avatar = avatar;
    }
    if let Some(preferences) = body.preferences {
        merge_preferences(&mut user.preferences.0, preferences);
    }

    let saved = state
        .store
        .save_profile(&user)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(ApiResponse::ok(saved.into())))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(body): AppJson<UpdatePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    body.validate()?;
    let user = current_user(&state, &auth).await?;

    if !verify_password(&body.current_password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }

    let new_hash = hash_password(&body.new_password)?;
    state.store.set_password_hash(user.id, &new_hash).await?;

    tracing::info!(user_id = %user.id, "Password updated");
    Ok(Json(ApiResponse::message("Password updated")))
}
