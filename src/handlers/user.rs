use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::middleware::BearerToken;
use crate::db::accounts;
use crate::error::AppError;
use crate::handlers::auth::AccountResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<AccountResponse>,
}

/// Active accounts, for any caller holding a valid session token.
pub async fn list_users(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<UserListResponse>, AppError> {
    state.jwt.verify_session_token(&token)?;
    let users = accounts::list_active(&state.db)
        .await?
        .into_iter()
        .map(AccountResponse::from)
        .collect();

    Ok(Json(UserListResponse { users }))
}
