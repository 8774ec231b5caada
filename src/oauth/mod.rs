pub mod store;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use url::Url;

use crate::auth::jwt::{JwkSet, JwtManager, TokenPair};
use crate::config::Config;
use crate::db::accounts::{self, Account};
use crate::error::OAuthError;
use store::{
    AuthorizationCode, ClientRegistry, CodeStore, InMemoryClientRegistry, InMemoryCodeStore,
    InMemorySessionStore, RegisteredClient, SessionStore,
};

const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenParams {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub sub: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
}

/// Demo authorization-code broker.
///
/// Clients, browser sessions and outstanding codes sit behind the store
/// traits; accounts come from the credential store, so anyone who can log in
/// at `/auth/login` can also complete the OAuth flow.
#[derive(Clone)]
pub struct Broker {
    clients: Arc<dyn ClientRegistry>,
    sessions: Arc<dyn SessionStore>,
    codes: Arc<dyn CodeStore>,
    jwt: JwtManager,
    db: DatabaseConnection,
    code_ttl: Duration,
}

impl Broker {
    /// In-memory stores with the configured demo client registered.
    pub fn new(db: DatabaseConnection, jwt: JwtManager, config: &Config) -> Self {
        let demo = &config.demo_client;
        let clients = InMemoryClientRegistry::new(vec![RegisteredClient {
            client_id: demo.client_id.clone(),
            client_secret: demo.client_secret.clone(),
            redirect_uris: demo.redirect_uris.clone(),
        }]);

        Self::with_stores(
            db,
            jwt,
            Arc::new(clients),
            Arc::new(InMemorySessionStore::default()),
            Arc::new(InMemoryCodeStore::default()),
            Duration::seconds(config.oauth_code_ttl_secs),
        )
    }

    pub fn with_stores(
        db: DatabaseConnection,
        jwt: JwtManager,
        clients: Arc<dyn ClientRegistry>,
        sessions: Arc<dyn SessionStore>,
        codes: Arc<dyn CodeStore>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            clients,
            sessions,
            codes,
            jwt,
            db,
            code_ttl,
        }
    }

    /// Starts a browser session for an already authenticated account.
    pub async fn open_session(&self, account: &Account) -> Result<String, OAuthError> {
        let session_id = random_hex(32);
        self.sessions
            .insert(session_id.clone(), account.id.clone())
            .await?;
        tracing::debug!(account_id = %account.id, "OAuth session opened");
        Ok(session_id)
    }

    /// Validates an authorization request and returns where to send the
    /// browser. Errors are returned only when the redirect target itself cannot
    /// be trusted; a missing session becomes a `login_required` redirect.
    pub async fn authorize(
        &self,
        params: AuthorizeParams,
        session_id: Option<&str>,
    ) -> Result<Url, OAuthError> {
        if params.response_type.as_deref() != Some("code") {
            return Err(OAuthError::UnsupportedResponseType);
        }

        let client_id = params.client_id.unwrap_or_default();
        let client = self
            .clients
            .find(&client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        let redirect_uri = params.redirect_uri.unwrap_or_default();
        let mut target = Url::parse(&redirect_uri).map_err(|_| OAuthError::InvalidRedirectUri)?;
        if !redirect_allowed(&client, &target) {
            return Err(OAuthError::InvalidRedirectUri);
        }

        let state = params.state.filter(|s| !s.is_empty());

        let user_id = match session_id {
            Some(sid) => self.sessions.resolve(sid).await?,
            None => None,
        };
        let Some(user_id) = user_id else {
            {
                let mut query = target.query_pairs_mut();
                query.append_pair("error", "login_required");
                if let Some(state) = &state {
                    query.append_pair("state", state);
                }
            }
            return Ok(target);
        };

        let code = random_hex(64);
        self.codes
            .insert(
                code.clone(),
                AuthorizationCode {
                    client_id: client.client_id,
                    redirect_uri,
                    user_id,
                    expires_at: Utc::now() + self.code_ttl,
                },
            )
            .await?;

        {
            let mut query = target.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = &state {
                query.append_pair("state", state);
            }
        }
        Ok(target)
    }

    /// Redeems an authorization code for an access and identity token pair.
    pub async fn token(&self, params: TokenParams) -> Result<TokenPair, OAuthError> {
        if params.grant_type.as_deref() != Some(AUTHORIZATION_CODE_GRANT) {
            return Err(OAuthError::UnsupportedGrantType);
        }

        let client_id = params.client_id.unwrap_or_default();
        let client = self
            .clients
            .find(&client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;
        let presented_secret = params.client_secret.unwrap_or_default();
        if !bool::from(
            client
                .client_secret
                .as_bytes()
                .ct_eq(presented_secret.as_bytes()),
        ) {
            tracing::debug!(client_id = %client_id, "Client secret mismatch");
            return Err(OAuthError::InvalidClient);
        }

        // An absent code or redirect URI matches no stored grant.
        let code = params.code.unwrap_or_default();
        let redirect_uri = params.redirect_uri.unwrap_or_default();

        let grant = self
            .codes
            .take(&code, &client.client_id, &redirect_uri)
            .await?
            .ok_or(OAuthError::InvalidGrant)?;
        if grant.is_expired_at(Utc::now()) {
            return Err(OAuthError::InvalidGrant);
        }

        let account = accounts::find_by_id(&self.db, &grant.user_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(OAuthError::InvalidGrant)?;

        let pair = self
            .jwt
            .issue_token_pair(&account.id, &account.username, &client.client_id)?;
        tracing::info!(account_id = %account.id, client_id = %client.client_id, "Code redeemed");
        Ok(pair)
    }

    pub async fn userinfo(&self, token: Option<&str>) -> Result<UserInfo, OAuthError> {
        let token = token.ok_or(OAuthError::InvalidToken)?;
        let claims = self
            .jwt
            .verify_delegated_token(token)
            .map_err(|_| OAuthError::InvalidToken)?;

        let account = accounts::find_by_id(&self.db, &claims.sub)
            .await?
            .filter(|a| a.is_active)
            .ok_or(OAuthError::InvalidToken)?;

        Ok(UserInfo {
            sub: account.id,
            username: account.username,
        })
    }

    /// Drops expired codes. Redemption checks expiry on its own, so this only
    /// bounds memory.
    pub async fn purge_expired(&self) -> Result<usize, OAuthError> {
        self.codes.purge_expired(Utc::now()).await
    }

    pub fn jwks(&self) -> JwkSet {
        self.jwt.jwks()
    }

    pub fn discovery(&self) -> DiscoveryDocument {
        let issuer = self.jwt.issuer().trim_end_matches('/').to_string();
        DiscoveryDocument {
            authorization_endpoint: format!("{issuer}/oauth/authorize"),
            token_endpoint: format!("{issuer}/oauth/token"),
            userinfo_endpoint: format!("{issuer}/oauth/userinfo"),
            jwks_uri: format!("{issuer}/.well-known/jwks.json"),
            issuer,
            response_types_supported: vec!["code"],
            grant_types_supported: vec![AUTHORIZATION_CODE_GRANT],
            subject_types_supported: vec!["public"],
            id_token_signing_alg_values_supported: vec!["EdDSA"],
            token_endpoint_auth_methods_supported: vec!["client_secret_post", "client_secret_basic"],
            scopes_supported: vec!["openid", "profile"],
        }
    }
}

// Origin and path must match a registered URI; query and fragment are free.
fn redirect_allowed(client: &RegisteredClient, given: &Url) -> bool {
    client.redirect_uris.iter().any(|registered| {
        Url::parse(registered).is_ok_and(|allowed| {
            allowed.origin() == given.origin() && allowed.path() == given.path()
        })
    })
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
