use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections are reported through [`AppError`], so a
/// malformed body gets the same envelope as every other error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
