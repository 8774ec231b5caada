use std::env;

#[derive(Clone, Debug)]
pub struct DemoClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub session_token_ttl_secs: i64,
    pub oauth_token_ttl_secs: i64,
    pub oauth_code_ttl_secs: i64,
    pub oauth_sweep_interval_secs: u64,
    pub password_min_length: usize,
    pub demo_client: DemoClient,
    pub server_host: String,
    pub server_port: u16,
    pub app_env: String,
    pub cors_allowed_origins: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub trust_proxy_headers: bool,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_issuer: env::var("JWT_ISSUER")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            session_token_ttl_secs: parse_or("SESSION_TOKEN_TTL_SECS", 24 * 60 * 60),
            oauth_token_ttl_secs: parse_or("OAUTH_TOKEN_TTL_SECS", 15 * 60),
            oauth_code_ttl_secs: parse_or("OAUTH_CODE_TTL_SECS", 60),
            oauth_sweep_interval_secs: parse_or("OAUTH_SWEEP_INTERVAL_SECS", 60),
            password_min_length: parse_or("PASSWORD_MIN_LENGTH", 6),
            demo_client: DemoClient {
                client_id: env::var("DEMO_CLIENT_ID").unwrap_or_else(|_| "demo-client".to_string()),
                client_secret: env::var("DEMO_CLIENT_SECRET")
                    .unwrap_or_else(|_| "demo-secret".to_string()),
                redirect_uris: split_list(
                    &env::var("DEMO_CLIENT_REDIRECT_URIS")
                        .unwrap_or_else(|_| "http://localhost:5173/callback".to_string()),
                ),
            },
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_or("SERVER_PORT", 3001),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            rate_limit_max_requests: parse_or("RATE_LIMIT_MAX_REQUESTS", 20),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", 60),
            trust_proxy_headers: parse_or("TRUST_PROXY_HEADERS", false),
            log_json: env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    pub fn cors_origins(&self) -> Vec<String> {
        split_list(&self.cors_allowed_origins)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
