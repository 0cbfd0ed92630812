use sqlx::{
    FromRow, PgPool, Postgres,
    pool::PoolConnection,
    postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode},
    query::{Query, QueryAs},
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;

/// DbError
///
/// Failures surfaced by the data-access gateway. `Unavailable` (the store cannot be
/// reached at all) is kept apart from `Query` (the store answered with an error) so
/// callers and logs can tell an outage from a bad statement.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error("unique constraint violated: {0}")]
    Conflict(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Unavailable(e),
            sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict(e),
            _ => DbError::Query(e),
        }
    }
}

/// Database
///
/// The data-access gateway. Holds the static connection parameters and a pool that is
/// created on first use and then reused for the lifetime of the process. Every
/// statement goes through `sqlx` bind parameters; nothing here formats caller values
/// into SQL text.
pub struct Database {
    options: PgConnectOptions,
    max_connections: u32,
    pool: OnceCell<PgPool>,
}

impl Database {
    /// Builds the gateway without connecting.
    pub fn new(config: &DatabaseConfig) -> Self {
        let ssl_mode = config.ssl_mode.parse::<PgSslMode>().unwrap_or_else(|_| {
            tracing::warn!(ssl_mode = %config.ssl_mode, "Unknown DB_SSL_MODE, using prefer");
            PgSslMode::Prefer
        });

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode);

        Self {
            options,
            max_connections: config.max_connections,
            pool: OnceCell::new(),
        }
    }

    /// pool
    ///
    /// Returns the shared pool, connecting on the first call. Concurrent first callers
    /// wait on the same initialization; a failed attempt leaves the cell empty so the
    /// next request tries again.
    pub async fn pool(&self) -> Result<&PgPool, DbError> {
        self.pool
            .get_or_try_init(|| async {
                tracing::info!(
                    host = self.options.get_host(),
                    database = ?self.options.get_database(),
                    max_connections = self.max_connections,
                    "Initializing Postgres connection pool"
                );
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect_with(self.options.clone())
                    .await
                    .map_err(DbError::Unavailable)
            })
            .await
    }

    /// Checks a single connection out of the pool.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, DbError> {
        let pool = self.pool().await?;
        pool.acquire().await.map_err(DbError::Unavailable)
    }

    pub async fn fetch_all<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, DbError>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let pool = self.pool().await?;
        Ok(query.fetch_all(pool).await?)
    }

    pub async fn fetch_optional<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Option<T>, DbError>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let pool = self.pool().await?;
        Ok(query.fetch_optional(pool).await?)
    }

    pub async fn fetch_one<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<T, DbError>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let pool = self.pool().await?;
        Ok(query.fetch_one(pool).await?)
    }

    /// Runs a command and returns the number of affected rows.
    pub async fn execute<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<u64, DbError> {
        let pool = self.pool().await?;
        let result = query.execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_level_failures_are_unavailable() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::Unavailable(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::Unavailable(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(DbError::from(sqlx::Error::Io(io)), DbError::Unavailable(_)));
    }

    #[test]
    fn statement_failures_are_query_errors() {
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::Query(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::ColumnNotFound("role".into())),
            DbError::Query(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_store_reports_unavailable() {
        let config = DatabaseConfig {
            host: "127.0.0.1".to_string(),
            // Port 9 (discard) is never a Postgres listener.
            port: 9,
            ssl_mode: "disable".to_string(),
            ..DatabaseConfig::default()
        };
        let db = Database::new(&config);

        let err = db.pool().await.expect_err("connect should fail");
        assert!(matches!(err, DbError::Unavailable(_)));

        let err = db.acquire().await.expect_err("acquire should fail");
        assert!(matches!(err, DbError::Unavailable(_)));
    }
}
