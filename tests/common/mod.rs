#![allow(dead_code)]

use apseline_api::config::{Config, DemoClient};
use apseline_api::routes::create_router;
use apseline_api::AppState;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use base64::Engine;
use http_body_util::BodyExt;
use migration::MigratorTrait;
use tower::ServiceExt;

pub const CLIENT_ID: &str = "demo-client";
pub const CLIENT_SECRET: &str = "demo-secret";
pub const REDIRECT_URI: &str = "http://localhost:5173/callback";

// ─── TestResponse ────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body_bytes).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response as {}: {e}\nBody: {}",
                std::any::type_name::<T>(),
                self.text()
            )
        })
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {}. Body: {}",
            self.status,
            self.text()
        );
    }

    pub fn header(&self, name: header::HeaderName) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn location(&self) -> String {
        self.header(header::LOCATION)
            .unwrap_or_else(|| panic!("no Location header. Body: {}", self.text()))
    }

    /// The `sid` value from `Set-Cookie`.
    pub fn session_cookie(&self) -> String {
        let set_cookie = self
            .header(header::SET_COOKIE)
            .unwrap_or_else(|| panic!("no Set-Cookie header. Body: {}", self.text()));
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.trim().strip_prefix("sid="))
            .unwrap_or_else(|| panic!("unexpected Set-Cookie: {set_cookie}"))
            .to_string()
    }
}

// ─── TestApp ─────────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        jwt_issuer: "http://localhost:3001".to_string(),
        session_token_ttl_secs: 3600,
        oauth_token_ttl_secs: 900,
        oauth_code_ttl_secs: 60,
        oauth_sweep_interval_secs: 60,
        password_min_length: 6,
        demo_client: DemoClient {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            redirect_uris: vec![REDIRECT_URI.to_string()],
        },
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        app_env: "test".to_string(),
        cors_allowed_origins: "http://localhost:3000".to_string(),
        rate_limit_max_requests: 1000,
        rate_limit_window_secs: 60,
        trust_proxy_headers: false,
        log_json: false,
    }
}

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = apseline_api::db::connect(&config.database_url)
            .await
            .expect("Failed to connect to in-memory SQLite");

        migration::Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        let state = AppState::new(db, config).expect("Failed to build app state");
        let router = create_router(state.clone());

        Self { router, state }
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot failed");

        let status = resp.status();
        let headers = resp.headers().clone();
        let body_bytes = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        bearer: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = builder
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.request(req).await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    // ── Account helpers ──────────────────────────────────────────────────

    pub async fn register(&self, username: &str, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/register",
            serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }),
            None,
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/login",
            serde_json::json!({ "username": username, "password": password }),
            None,
        )
        .await
    }

    /// Registers and logs in, returning `(account_id, session_token)`.
    pub async fn register_and_login(&self, username: &str, password: &str) -> (String, String) {
        let email = format!("{username}@example.com");
        self.register(username, &email, password)
            .await
            .assert_status(StatusCode::OK);

        let resp = self.login(username, password).await;
        resp.assert_status(StatusCode::OK);
        let json: serde_json::Value = resp.json();
        (
            json["account"]["id"].as_str().unwrap().to_string(),
            json["token"].as_str().unwrap().to_string(),
        )
    }

    // ── OAuth helpers ────────────────────────────────────────────────────

    /// Demo login, returning the `sid` cookie value.
    pub async fn oauth_login(&self, username: &str, password: &str) -> String {
        let resp = self
            .post_json(
                "/oauth/login",
                serde_json::json!({ "username": username, "password": password }),
                None,
            )
            .await;
        resp.assert_status(StatusCode::OK);
        resp.session_cookie()
    }

    pub async fn authorize(&self, query: &str, sid: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("GET")
            .uri(format!("/oauth/authorize?{query}"));
        if let Some(sid) = sid {
            builder = builder.header(header::COOKIE, format!("sid={sid}"));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Runs authorize with a live session and returns the issued code.
    pub async fn obtain_code(&self, sid: &str, redirect_uri: &str) -> String {
        let query = format!(
            "response_type=code&client_id={CLIENT_ID}&redirect_uri={}&state=xyz",
            encode(redirect_uri)
        );
        let resp = self.authorize(&query, Some(sid)).await;
        resp.assert_status(StatusCode::FOUND);

        let location = url::Url::parse(&resp.location()).unwrap();
        location
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_else(|| panic!("no code in {location}"))
    }

    pub async fn token(&self, form: &[(&str, &str)], basic: Option<(&str, &str)>) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri("/oauth/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some((id, secret)) = basic {
            builder = builder.header(header::AUTHORIZATION, basic_auth_header(id, secret));
        }
        self.request(builder.body(Body::from(body)).unwrap()).await
    }
}

pub fn basic_auth_header(client_id: &str, secret: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{client_id}:{secret}"));
    format!("Basic {encoded}")
}

pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
