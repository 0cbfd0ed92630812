use leave_portal::{
    AppState,
    audit::{AuditState, PostgresAuditLog},
    config::{AppConfig, Env},
    create_router,
    db::Database,
    repository::{PostgresRepository, RepositoryState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, wires the database-backed services into
/// `AppState` and serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "leave_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database gateway. The pool itself is created on first use.
    let db = Arc::new(Database::new(&config.db));

    if config.run_migrations {
        let pool = db
            .pool()
            .await
            .expect("FATAL: Failed to connect to Postgres. Check the DB_* settings.");
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .expect("FATAL: Failed to apply database migrations.");
        tracing::info!("Database migrations applied.");
    }

    let repo = Arc::new(PostgresRepository::new(db.clone())) as RepositoryState;
    let audit = Arc::new(PostgresAuditLog::new(db)) as AuditState;

    // 4. Unified state and server startup
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        audit,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
