pub mod auth;
pub mod meta;
pub mod oauth2;
pub mod user;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Unwraps a JSON body, reporting a malformed one as a validation error in the
/// usual error shape instead of axum's plain-text rejection.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}
