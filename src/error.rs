use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("Username or email already exists")]
    AccountAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::WeakPassword { .. } => {
                (StatusCode::BAD_REQUEST, "weak_password", self.to_string())
            }
            AppError::AccountAlreadyExists => {
                (StatusCode::CONFLICT, "account_already_exists", self.to_string())
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid_credentials", self.to_string())
            }
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "invalid_token", self.to_string())
            }
            AppError::AccountNotFound => {
                (StatusCode::NOT_FOUND, "account_not_found", self.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
            AppError::Jwt(_) => {
                (StatusCode::UNAUTHORIZED, "invalid_token", AppError::InvalidToken.to_string())
            }
        };

        let body = json!({
            "error": error_type,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Errors of the authorization-code broker, rendered with RFC 6749 error codes.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_client")]
    InvalidClient,

    #[error("invalid_redirect_uri")]
    InvalidRedirectUri,

    #[error("invalid_grant")]
    InvalidGrant,

    #[error("unsupported_response_type")]
    UnsupportedResponseType,

    #[error("unsupported_grant_type")]
    UnsupportedGrantType,

    #[error("invalid_token")]
    InvalidToken,

    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient => "invalid_client",
            OAuthError::InvalidRedirectUri => "invalid_redirect_uri",
            OAuthError::InvalidGrant => "invalid_grant",
            OAuthError::UnsupportedResponseType => "unsupported_response_type",
            OAuthError::UnsupportedGrantType => "unsupported_grant_type",
            OAuthError::InvalidToken => "invalid_token",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OAuthError::InvalidClient | OAuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            OAuthError::InvalidRequest(description) => json!({
                "error": self.code(),
                "error_description": description,
            }),
            OAuthError::ServerError(e) => {
                tracing::error!("OAuth server error: {e}");
                json!({ "error": self.code() })
            }
            _ => json!({ "error": self.code() }),
        }
    }
}

impl From<AppError> for OAuthError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidToken | AppError::Jwt(_) => OAuthError::InvalidToken,
            other => OAuthError::ServerError(other.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for OAuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        OAuthError::ServerError(err.to_string())
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        (self.status(), axum::Json(self.body())).into_response()
    }
}

/// Authorization endpoint failures that cannot be redirected back to the client.
/// Every client-side error here is a 400, including `invalid_client`.
#[derive(Debug)]
pub struct AuthorizeError(pub OAuthError);

impl From<OAuthError> for AuthorizeError {
    fn from(err: OAuthError) -> Self {
        AuthorizeError(err)
    }
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, axum::Json(self.0.body())).into_response()
    }
}
