use chrono::Duration;
use sea_orm::DatabaseConnection;

use crate::auth::jwt::JwtManager;
use crate::auth::password::{
    hash_in_background, validate_password, verify_against_dummy, verify_in_background,
};
use crate::config::Config;
use crate::db::accounts::{self, Account, NewAccount};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Registration, login, identity lookup and password rotation for local
/// accounts. Holds no state between calls beyond the credential store.
#[derive(Clone)]
pub struct AccountService {
    db: DatabaseConnection,
    jwt: JwtManager,
    min_password_length: usize,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(db: DatabaseConnection, jwt: JwtManager, config: &Config) -> Self {
        Self {
            db,
            jwt,
            min_password_length: config.password_min_length,
            session_ttl: Duration::seconds(config.session_token_ttl_secs),
        }
    }

    pub async fn register(&self, req: Registration) -> Result<Account, AppError> {
        let (Some(username), Some(email), Some(password)) = (
            non_blank(req.username),
            non_blank(req.email),
            req.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::Validation(
                "Username, email, and password are required".to_string(),
            ));
        };

        validate_identity(&username, &email)?;
        validate_password(&password, self.min_password_length)?;

        if accounts::exists_with_username_or_email(&self.db, &username, &email).await? {
            return Err(AppError::AccountAlreadyExists);
        }

        let password_hash = hash_in_background(password).await?;
        let account = accounts::create(
            &self.db,
            NewAccount {
                username,
                email,
                password_hash,
                first_name: non_blank(req.first_name),
                last_name: non_blank(req.last_name),
            },
        )
        .await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Checks a username (or email) and password without touching the account.
    ///
    /// Unknown, inactive and digest-less accounts fail exactly like a wrong
    /// password.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<Account, AppError> {
        let account = accounts::find_by_username_or_email(&self.db, identifier).await?;

        let (account, digest) = match account {
            Some(account) if account.is_active => match account.password_hash.clone() {
                Some(digest) => (account, digest),
                None => {
                    verify_against_dummy(password.to_string()).await;
                    return Err(AppError::InvalidCredentials);
                }
            },
            _ => {
                verify_against_dummy(password.to_string()).await;
                return Err(AppError::InvalidCredentials);
            }
        };

        if !verify_in_background(password.to_string(), digest).await? {
            tracing::debug!(account_id = %account.id, "Password mismatch");
            return Err(AppError::InvalidCredentials);
        }
        Ok(account)
    }

    pub async fn login(
        &self,
        identifier: Option<String>,
        password: Option<String>,
    ) -> Result<(Account, String), AppError> {
        let (Some(identifier), Some(password)) =
            (non_blank(identifier), password.filter(|p| !p.is_empty()))
        else {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        };

        let mut account = self.authenticate(&identifier, &password).await?;
        account.last_login_at = Some(accounts::update_last_login(&self.db, &account.id).await?);

        let token = self
            .jwt
            .issue_session_token(&account.id, &account.username, self.session_ttl)?;

        tracing::info!(account_id = %account.id, "Login succeeded");
        Ok((account, token))
    }

    pub async fn whoami(&self, token: &str) -> Result<Account, AppError> {
        let claims = self.jwt.verify_session_token(token)?;
        accounts::find_by_id(&self.db, &claims.sub)
            .await?
            .ok_or(AppError::AccountNotFound)
    }

    pub async fn change_password(
        &self,
        token: &str,
        current_password: Option<String>,
        new_password: Option<String>,
    ) -> Result<(), AppError> {
        let claims = self.jwt.verify_session_token(token)?;

        let (Some(current_password), Some(new_password)) = (
            current_password.filter(|p| !p.is_empty()),
            new_password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::Validation(
                "Current password and new password are required".to_string(),
            ));
        };

        let account = accounts::find_by_id(&self.db, &claims.sub)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        let digest = account.password_hash.ok_or(AppError::InvalidCredentials)?;
        if !verify_in_background(current_password, digest).await? {
            return Err(AppError::InvalidCredentials);
        }

        validate_password(&new_password, self.min_password_length)?;

        let new_digest = hash_in_background(new_password).await?;
        accounts::update_password_digest(&self.db, &account.id, &new_digest).await?;

        tracing::info!(account_id = %account.id, "Password changed");
        Ok(())
    }
}

/// Usernames may not contain `@`, so a login identifier can never name one
/// account's username and another account's email.
pub fn validate_identity(username: &str, email: &str) -> Result<(), AppError> {
    if username.contains('@') {
        return Err(AppError::Validation(
            "Username must not contain '@'".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("Email address is malformed".to_string()));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
