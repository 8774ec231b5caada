use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use base64::Engine;

use crate::error::{AppError, OAuthError};

/// The raw token from an `Authorization: Bearer` header. Which key it must
/// verify against is left to the handler.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)
            .map(BearerToken)
            .ok_or(AppError::InvalidToken)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Client credentials from an `Authorization: Basic` header, if one was sent.
///
/// A request without the header (or with another scheme) yields `None` so the
/// token endpoint can fall back to form fields. A Basic header that does not
/// decode to `id:secret` is rejected outright.
#[derive(Debug, Clone)]
pub struct BasicClientAuth(pub Option<ClientCredentials>);

#[async_trait]
impl<S> FromRequestParts<S> for BasicClientAuth
where
    S: Send + Sync,
{
    type Rejection = OAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(BasicClientAuth(None));
        };
        let Some(encoded) = value.strip_prefix("Basic ") else {
            return Ok(BasicClientAuth(None));
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| OAuthError::InvalidClient)?;
        let decoded = String::from_utf8(decoded).map_err(|_| OAuthError::InvalidClient)?;
        let (client_id, client_secret) =
            decoded.split_once(':').ok_or(OAuthError::InvalidClient)?;

        Ok(BasicClientAuth(Some(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })))
    }
}
