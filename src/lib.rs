pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod oauth;
pub mod rate_limit;
pub mod routes;
pub mod seed;

use sea_orm::DatabaseConnection;

use auth::account::AccountService;
use auth::jwt::JwtManager;
use config::Config;
use error::AppError;
use oauth::Broker;
use rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub jwt: JwtManager,
    pub accounts: AccountService,
    pub broker: Broker,
    pub rate_limiter: RateLimiter,
    pub config: Config,
}

impl AppState {
    /// Wires the services over one connection and one key set.
    pub fn new(db: DatabaseConnection, config: Config) -> Result<Self, AppError> {
        let jwt = JwtManager::new(&config)?;
        let accounts = AccountService::new(db.clone(), jwt.clone(), &config);
        let broker = Broker::new(db.clone(), jwt.clone(), &config);
        let rate_limiter = RateLimiter::from_config(&config);

        Ok(Self {
            db,
            jwt,
            accounts,
            broker,
            rate_limiter,
            config,
        })
    }
}
