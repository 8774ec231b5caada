use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::rate_limit_middleware;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentialed CORS cannot use wildcards.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Credential-accepting endpoints share one per-IP limiter.
    let limited =
        || middleware::from_fn_with_state(state.rate_limiter.clone(), rate_limit_middleware);

    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route_layer(limited())
        .route("/me", get(handlers::auth::me))
        .route("/change-password", post(handlers::auth::change_password))
        .route("/logout", post(handlers::auth::logout));

    let oauth_routes = Router::new()
        .route("/login", post(handlers::oauth2::login))
        .route("/token", post(handlers::oauth2::token))
        .route_layer(limited())
        .route("/authorize", get(handlers::oauth2::authorize))
        .route("/userinfo", get(handlers::oauth2::userinfo));

    let well_known = Router::new()
        .route("/jwks.json", get(handlers::oauth2::jwks))
        .route(
            "/openid-configuration",
            get(handlers::oauth2::openid_configuration),
        );

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/oauth", oauth_routes)
        .nest("/.well-known", well_known)
        .route("/api/users", get(handlers::user::list_users))
        .route("/health", get(handlers::meta::health))
        .route("/", get(handlers::meta::index))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
