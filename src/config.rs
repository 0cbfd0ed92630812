use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared with handlers and extractors through `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local `x-user-id` bypass and log format.
    pub env: Env,
    // Connection parameters for the relational store.
    pub db: DatabaseConfig,
    // HMAC secret used to sign and validate session tokens.
    pub jwt_secret: String,
    // Lifetime of issued session tokens.
    pub session_ttl_hours: i64,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Apply the SQL migrations under ./migrations at startup.
    pub run_migrations: bool,
}

/// DatabaseConfig
///
/// Static parameters the lazily-initialized pool is built from. The pool itself is
/// only created on first use (see `db::Database`).
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    /// One of `disable`, `allow`, `prefer`, `require`, `verify-ca`, `verify-full`.
    pub ssl_mode: String,
    pub max_connections: u32,
}

/// Env
///
/// Defines the runtime context, used to switch between development conveniences
/// (header bypass, pretty logs) and hardened production behaviour.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const LOCAL_JWT_SECRET: &str = "leave-portal-local-development-secret";

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "leave_portal".to_string(),
            user: "postgres".to_string(),
            password: "password".to_string(),
            ssl_mode: "prefer".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration used for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db: DatabaseConfig::default(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl_hours: 8,
            bind_addr: "0.0.0.0:3000".to_string(),
            run_migrations: true,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables and applies the fail-fast
    /// principle for production.
    ///
    /// # Panics
    /// Panics in `Env::Production` when a database credential or `JWT_SECRET` is missing,
    /// so the service never starts half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let defaults = DatabaseConfig::default();
        let db = match env {
            Env::Production => DatabaseConfig {
                host: env::var("DB_HOST").expect("FATAL: DB_HOST required in prod"),
                name: env::var("DB_NAME").expect("FATAL: DB_NAME required in prod"),
                user: env::var("DB_USER").expect("FATAL: DB_USER required in prod"),
                password: env::var("DB_PASSWORD").expect("FATAL: DB_PASSWORD required in prod"),
                port: parse_var("DB_PORT", defaults.port),
                ssl_mode: env::var("DB_SSL_MODE").unwrap_or_else(|_| "require".to_string()),
                max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.max_connections),
            },
            Env::Local => DatabaseConfig {
                host: env::var("DB_HOST").unwrap_or(defaults.host),
                name: env::var("DB_NAME").unwrap_or(defaults.name),
                user: env::var("DB_USER").unwrap_or(defaults.user),
                password: env::var("DB_PASSWORD").unwrap_or(defaults.password),
                port: parse_var("DB_PORT", defaults.port),
                ssl_mode: env::var("DB_SSL_MODE").unwrap_or(defaults.ssl_mode),
                max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.max_connections),
            },
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        Self {
            env,
            db,
            jwt_secret,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 8),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            run_migrations: parse_var("RUN_MIGRATIONS", true),
        }
    }
}

/// Reads and parses an optional variable, keeping the default when absent or malformed.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
