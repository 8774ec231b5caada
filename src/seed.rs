use sea_orm::DatabaseConnection;

use crate::auth::account::validate_identity;
use crate::auth::password::{hash_in_background, validate_password};
use crate::db::accounts::{self, NewAccount};
use crate::error::AppError;

#[derive(Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    Created { account_id: String },
    AlreadyExists { account_id: String },
}

/// Creates a local account for the demo flow unless one with the same
/// username or email is already present. Safe to run repeatedly.
pub async fn bootstrap(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    min_password_length: usize,
) -> Result<SeedOutcome, AppError> {
    for identifier in [username, email] {
        if let Some(existing) = accounts::find_by_username_or_email(db, identifier).await? {
            return Ok(SeedOutcome::AlreadyExists {
                account_id: existing.id,
            });
        }
    }

    validate_identity(username, email)?;
    validate_password(password, min_password_length)?;
    let password_hash = hash_in_background(password.to_string()).await?;
    let account = accounts::create(
        db,
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            first_name: None,
            last_name: None,
        },
    )
    .await?;

    tracing::info!(account_id = %account.id, "Seeded account");
    Ok(SeedOutcome::Created {
        account_id: account.id,
    })
}

/// Marks an account inactive. Returns `false` when no account matches.
pub async fn deactivate(db: &DatabaseConnection, identifier: &str) -> Result<bool, AppError> {
    let Some(account) = accounts::find_by_username_or_email(db, identifier).await? else {
        return Ok(false);
    };
    accounts::set_active(db, &account.id, false).await?;
    tracing::info!(account_id = %account.id, "Account deactivated");
    Ok(true)
}
