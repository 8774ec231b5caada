use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::account::Registration;
use crate::auth::middleware::BearerToken;
use crate::db::accounts::Account;
use crate::error::AppError;
use crate::handlers::json_body;
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// `username` may also carry an email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Public view of an account. The password digest never leaves the server.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            avatar_url: account.avatar_url,
            email_verified: account.email_verified,
            is_active: account.is_active,
            created_at: account.created_at.and_utc().to_rfc3339(),
            last_login_at: account.last_login_at.map(|t| t.and_utc().to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountEnvelope {
    pub account: AccountResponse,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account: AccountResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// --- Handlers ---

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AccountEnvelope>, AppError> {
    let req = json_body(body)?;
    let account = state
        .accounts
        .register(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok(Json(AccountEnvelope {
        account: account.into(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let req = json_body(body)?;
    let (account, token) = state.accounts.login(req.username, req.password).await?;

    Ok(Json(LoginResponse {
        account: account.into(),
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<AccountEnvelope>, AppError> {
    let account = state.accounts.whoami(&token).await?;
    Ok(Json(AccountEnvelope {
        account: account.into(),
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = json_body(body)?;
    state
        .accounts
        .change_password(&token, req.current_password, req.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

/// Session tokens are stateless; logout only confirms the token was valid and
/// leaves discarding it to the client.
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>, AppError> {
    let claims = state.jwt.verify_session_token(&token)?;
    tracing::info!(account_id = %claims.sub, "Logout");

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
