use std::net::SocketAddr;
use std::time::Duration;

use apseline_api::config::Config;
use apseline_api::seed::{self, SeedOutcome};
use apseline_api::AppState;
use migration::MigratorTrait;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| format!("DATABASE_URL and JWT_SECRET must be set: {e}"))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apseline_api=debug,tower_http=debug".into());
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let db = apseline_api::db::connect(&config.database_url).await?;
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations applied");

    // seed <username> <email> <password> | deactivate <username-or-email>
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("seed") => {
            let (Some(username), Some(email), Some(password)) =
                (args.get(2), args.get(3), args.get(4))
            else {
                return Err("usage: seed <username> <email> <password>".into());
            };
            match seed::bootstrap(&db, username, email, password, config.password_min_length)
                .await?
            {
                SeedOutcome::Created { account_id } => {
                    println!("Created account {username} ({account_id})")
                }
                SeedOutcome::AlreadyExists { account_id } => {
                    println!("Account {username} already exists ({account_id})")
                }
            }
            return Ok(());
        }
        Some("deactivate") => {
            let Some(identifier) = args.get(2) else {
                return Err("usage: deactivate <username-or-email>".into());
            };
            if seed::deactivate(&db, identifier).await? {
                println!("Deactivated {identifier}");
            } else {
                println!("No account matches {identifier}");
            }
            return Ok(());
        }
        _ => {}
    }

    let state = AppState::new(db, config.clone())?;
    spawn_reaper(state.clone(), Duration::from_secs(config.oauth_sweep_interval_secs.max(1)));

    let app = apseline_api::routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drops expired authorization codes and idle rate-limit buckets.
fn spawn_reaper(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match state.broker.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "Expired authorization codes dropped"),
                Err(e) => tracing::warn!("Code sweep failed: {e}"),
            }
            state.rate_limiter.prune();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
