use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::JwkSet;
use crate::auth::middleware::{BasicClientAuth, BearerToken};
use crate::error::{AppError, AuthorizeError, OAuthError};
use crate::handlers::json_body;
use crate::oauth::{AuthorizeParams, DiscoveryDocument, TokenParams, UserInfo};
use crate::AppState;

pub const SESSION_COOKIE: &str = "sid";

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct DemoLoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct DemoLoginResponse {
    pub ok: bool,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

// --- Handlers ---

/// Demo login for the authorization flow. Checks the account's password and
/// hands the browser a `sid` cookie that `/oauth/authorize` recognizes.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<DemoLoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<DemoLoginResponse>), AppError> {
    let req = json_body(body)?;
    let (Some(username), Some(password)) = (
        req.username.filter(|u| !u.trim().is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    };

    let account = state.accounts.authenticate(username.trim(), &password).await?;
    let session_id = state
        .broker
        .open_session(&account)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        Json(DemoLoginResponse {
            ok: true,
            user: SessionUser {
                id: account.id,
                username: account.username,
            },
        }),
    ))
}

pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, AuthorizeError> {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let target = state
        .broker
        .authorize(params, session_id.as_deref())
        .await?;

    // 302 rather than axum's 303 `Redirect::to`.
    Ok((StatusCode::FOUND, [(header::LOCATION, target.to_string())]).into_response())
}

/// Client credentials may come from the form or from HTTP Basic; Basic wins.
pub async fn token(
    State(state): State<AppState>,
    BasicClientAuth(basic): BasicClientAuth,
    form: Result<Form<TokenParams>, FormRejection>,
) -> Result<Response, OAuthError> {
    let Form(mut params) = form
        .map_err(|_| OAuthError::InvalidRequest("expected form body".to_string()))?;

    if let Some(credentials) = basic {
        params.client_id = Some(credentials.client_id);
        params.client_secret = Some(credentials.client_secret);
    }

    let pair = state.broker.token(params).await?;

    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(TokenResponse {
            access_token: pair.access_token,
            id_token: pair.id_token,
            token_type: "Bearer",
            expires_in: pair.expires_in,
        }),
    )
        .into_response())
}

pub async fn userinfo(
    State(state): State<AppState>,
    bearer: Option<BearerToken>,
) -> Result<Json<UserInfo>, OAuthError> {
    let token = bearer.map(|BearerToken(token)| token);
    Ok(Json(state.broker.userinfo(token.as_deref()).await?))
}

pub async fn jwks(State(state): State<AppState>) -> Json<JwkSet> {
    Json(state.broker.jwks())
}

pub async fn openid_configuration(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    Json(state.broker.discovery())
}
