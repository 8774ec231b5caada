use chrono::{NaiveDateTime, Utc};
use entity::account::{self, Entity as Accounts};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use uuid::Uuid;

use crate::error::AppError;

pub type Account = account::Model;

/// Fields supplied at registration; everything else takes its column default.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub async fn find_by_id(db: &DatabaseConnection, id: &str) -> Result<Option<Account>, AppError> {
    Ok(Accounts::find_by_id(id.to_string()).one(db).await?)
}

/// Resolves a login identifier. A username match wins; the email column is
/// consulted only when no account has that username.
pub async fn find_by_username_or_email(
    db: &DatabaseConnection,
    identifier: &str,
) -> Result<Option<Account>, AppError> {
    if let Some(account) = Accounts::find()
        .filter(account::Column::Username.eq(identifier))
        .one(db)
        .await?
    {
        return Ok(Some(account));
    }
    Ok(Accounts::find()
        .filter(account::Column::Email.eq(identifier))
        .one(db)
        .await?)
}

/// True when either value is already taken as a username or as an email.
pub async fn exists_with_username_or_email(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
) -> Result<bool, AppError> {
    let existing = Accounts::find()
        .filter(
            Condition::any()
                .add(account::Column::Username.is_in([username, email]))
                .add(account::Column::Email.is_in([username, email])),
        )
        .one(db)
        .await?;
    Ok(existing.is_some())
}

/// Inserts a local account. A unique-constraint violation from the database is
/// reported as `AccountAlreadyExists`, which keeps the check atomic even when
/// two registrations race past the application-level pre-check.
pub async fn create(db: &DatabaseConnection, new: NewAccount) -> Result<Account, AppError> {
    let now = Utc::now().naive_utc();

    let model = account::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(new.username),
        email: Set(new.email),
        password_hash: Set(Some(new.password_hash)),
        first_name: Set(new.first_name),
        last_name: Set(new.last_name),
        avatar_url: Set(None),
        provider: Set(Some("local".to_string())),
        provider_id: Set(None),
        provider_data: Set(None),
        email_verified: Set(false),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    model.insert(db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::AccountAlreadyExists,
        _ => AppError::Database(e),
    })
}

pub async fn update_password_digest(
    db: &DatabaseConnection,
    id: &str,
    digest: &str,
) -> Result<(), AppError> {
    Accounts::update_many()
        .col_expr(account::Column::PasswordHash, Expr::value(digest.to_string()))
        .col_expr(account::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .filter(account::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

/// Stamps the login time and returns the value written.
pub async fn update_last_login(
    db: &DatabaseConnection,
    id: &str,
) -> Result<NaiveDateTime, AppError> {
    let now = Utc::now().naive_utc();
    Accounts::update_many()
        .col_expr(account::Column::LastLoginAt, Expr::value(now))
        .filter(account::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(now)
}

pub async fn set_active(db: &DatabaseConnection, id: &str, active: bool) -> Result<(), AppError> {
    Accounts::update_many()
        .col_expr(account::Column::IsActive, Expr::value(active))
        .col_expr(account::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .filter(account::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<Account>, AppError> {
    Ok(Accounts::find()
        .filter(account::Column::IsActive.eq(true))
        .order_by_asc(account::Column::Username)
        .all(db)
        .await?)
}
