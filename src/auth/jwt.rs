use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::AppError;

const DELEGATED_SCOPE: &str = "openid profile";

/// First-party session token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String, // account ID
    pub username: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub sub: String,
    pub aud: String, // client_id of the relying party
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub scope: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub username: String,
}

/// The claims common to access and identity tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DelegatedClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub id_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub kid: String,
    pub x: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Signs and verifies both token families.
///
/// Session tokens use HS256 with the configured shared secret. Tokens minted
/// for OAuth clients use EdDSA with a key pair generated at construction and
/// held only in memory, so a restart invalidates every outstanding delegated
/// token.
#[derive(Clone)]
pub struct JwtManager {
    session_encoding_key: EncodingKey,
    session_decoding_key: DecodingKey,
    delegated_encoding_key: EncodingKey,
    delegated_decoding_key: DecodingKey,
    public_key: Vec<u8>,
    key_id: String,
    issuer: String,
    delegated_token_expiry_secs: i64,
}

impl JwtManager {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        if config.jwt_secret.is_empty() {
            return Err(AppError::Internal("JWT secret must not be empty".to_string()));
        }

        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| AppError::Internal("Failed to generate signing key".to_string()))?;
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|_| AppError::Internal("Generated signing key is invalid".to_string()))?;
        let public_key = key_pair.public_key().as_ref().to_vec();

        let key_id = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(Sha256::digest(&public_key));

        Ok(Self {
            session_encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            session_decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            delegated_encoding_key: EncodingKey::from_ed_der(pkcs8.as_ref()),
            delegated_decoding_key: DecodingKey::from_ed_der(&public_key),
            public_key,
            key_id,
            issuer: config.jwt_issuer.clone(),
            delegated_token_expiry_secs: config.oauth_token_ttl_secs,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue_session_token(
        &self,
        subject: &str,
        username: &str,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: subject.to_string(),
            username: username.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl.num_seconds(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.session_encoding_key).map_err(AppError::Jwt)
    }

    pub fn verify_session_token(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        validation.leeway = 0;

        let claims = decode::<SessionClaims>(token, &self.session_decoding_key, &validation)
            .map_err(|_| AppError::InvalidToken)?
            .claims;
        ensure_unexpired(claims.exp)?;
        Ok(claims)
    }

    pub fn issue_token_pair(
        &self,
        subject: &str,
        username: &str,
        client_id: &str,
    ) -> Result<TokenPair, AppError> {
        let now = Utc::now().timestamp();
        let exp = now + self.delegated_token_expiry_secs;

        let access = AccessClaims {
            sub: subject.to_string(),
            aud: client_id.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp,
            scope: DELEGATED_SCOPE.to_string(),
        };
        let id = IdClaims {
            sub: subject.to_string(),
            aud: client_id.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp,
            username: username.to_string(),
        };

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.key_id.clone());

        Ok(TokenPair {
            access_token: encode(&header, &access, &self.delegated_encoding_key)?,
            id_token: encode(&header, &id, &self.delegated_encoding_key)?,
            expires_in: self.delegated_token_expiry_secs,
        })
    }

    /// Verifies signature, issuer and expiry. The audience is not pinned here;
    /// any registered client's token is acceptable at the userinfo endpoint.
    pub fn verify_delegated_token(&self, token: &str) -> Result<DelegatedClaims, AppError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "aud", "exp", "iat", "iss"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<DelegatedClaims>(token, &self.delegated_decoding_key, &validation)
            .map_err(|_| AppError::InvalidToken)?
            .claims;
        ensure_unexpired(claims.exp)?;
        Ok(claims)
    }

    pub fn jwks(&self) -> JwkSet {
        JwkSet {
            keys: vec![Jwk {
                kty: "OKP".to_string(),
                crv: "Ed25519".to_string(),
                alg: "EdDSA".to_string(),
                use_: "sig".to_string(),
                kid: self.key_id.clone(),
                x: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&self.public_key),
            }],
        }
    }
}

// jsonwebtoken accepts a token in its final second; we do not.
fn ensure_unexpired(exp: i64) -> Result<(), AppError> {
    if Utc::now().timestamp() >= exp {
        return Err(AppError::InvalidToken);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoClient;

    fn config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "unit-test-secret".to_string(),
            jwt_issuer: "http://issuer.test".to_string(),
            session_token_ttl_secs: 3600,
            oauth_token_ttl_secs: 900,
            oauth_code_ttl_secs: 60,
            oauth_sweep_interval_secs: 60,
            password_min_length: 6,
            demo_client: DemoClient {
                client_id: "demo-client".to_string(),
                client_secret: "demo-secret".to_string(),
                redirect_uris: vec![],
            },
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            app_env: "test".to_string(),
            cors_allowed_origins: String::new(),
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
            trust_proxy_headers: false,
            log_json: false,
        }
    }

    #[test]
    fn session_token_round_trips_subject_and_username() {
        let jwt = JwtManager::new(&config()).unwrap();
        let token = jwt
            .issue_session_token("acc-1", "alice", Duration::hours(24))
            .unwrap();
        let claims = jwt.verify_session_token(&token).unwrap();
        assert_eq!(claims.sub, "acc-1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn token_at_expiry_is_rejected() {
        let jwt = JwtManager::new(&config()).unwrap();
        let token = jwt
            .issue_session_token("acc-1", "alice", Duration::zero())
            .unwrap();
        assert!(matches!(
            jwt.verify_session_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn session_token_from_another_secret_is_rejected() {
        let jwt = JwtManager::new(&config()).unwrap();
        let mut other_config = config();
        other_config.jwt_secret = "some-other-secret".to_string();
        let other = JwtManager::new(&other_config).unwrap();

        let token = other
            .issue_session_token("acc-1", "alice", Duration::hours(1))
            .unwrap();
        assert!(matches!(
            jwt.verify_session_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn token_families_do_not_cross_verify() {
        let jwt = JwtManager::new(&config()).unwrap();
        let session = jwt
            .issue_session_token("acc-1", "alice", Duration::hours(1))
            .unwrap();
        let pair = jwt.issue_token_pair("acc-1", "alice", "demo-client").unwrap();

        assert!(jwt.verify_delegated_token(&session).is_err());
        assert!(jwt.verify_session_token(&pair.access_token).is_err());
    }

    #[test]
    fn delegated_tokens_carry_audience_and_key_id() {
        let jwt = JwtManager::new(&config()).unwrap();
        let pair = jwt.issue_token_pair("acc-1", "alice", "demo-client").unwrap();
        assert_eq!(pair.expires_in, 900);

        let claims = jwt.verify_delegated_token(&pair.id_token).unwrap();
        assert_eq!(claims.aud, "demo-client");
        assert_eq!(claims.iss, "http://issuer.test");

        let header = jsonwebtoken::decode_header(&pair.access_token).unwrap();
        assert_eq!(header.alg, Algorithm::EdDSA);
        assert_eq!(header.kid.as_deref(), Some(jwt.jwks().keys[0].kid.as_str()));
    }

    #[test]
    fn delegated_token_from_another_instance_is_rejected() {
        let a = JwtManager::new(&config()).unwrap();
        let b = JwtManager::new(&config()).unwrap();
        let pair = b.issue_token_pair("acc-1", "alice", "demo-client").unwrap();
        assert!(a.verify_delegated_token(&pair.access_token).is_err());
    }
}
