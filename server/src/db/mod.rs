//! Pooled access to the PostgreSQL store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::FromRow;
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::config::DatabaseConfig;

pub mod statement;

pub use statement::{Clause, SqlStatement, SqlValue};

#[derive(Debug, Default)]
struct PoolHealth {
    faulted: AtomicBool,
    notify: Notify,
}

/// Handle to the connection pool. Cloning is cheap and shares the pool.
///
/// sqlx has no pool-wide error event; a `PoolClosed` or `WorkerCrashed` error
/// surfacing from any call is treated as that event. The service never closes
/// its own pool while serving, so these only appear when sqlx gives up on it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    health: Arc<PoolHealth>,
}

impl Database {
    /// Builds the pool without opening any connection. Call [`Database::ping`]
    /// before serving traffic.
    pub fn connect(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min)
            .max_connections(config.pool_max)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(config.connect_timeout)
            .connect_lazy_with(options);

        Self::from_pool(pool)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            health: Arc::new(PoolHealth::default()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Liveness probe: one trivial round trip.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let result = sqlx::query("SELECT NOW()").execute(&self.pool).await;
        self.observe(result).map(|_| ())
    }

    pub async fn fetch_all<O>(&self, statement: SqlStatement) -> Result<Vec<O>, sqlx::Error>
    where
        O: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, values) = statement.render();
        debug!(sql = %sql, params = values.len(), "fetch_all");

        let query = values
            .into_iter()
            .fold(sqlx::query_as::<_, O>(&sql), |query, value| value.bind_as(query));
        let result = query.fetch_all(&self.pool).await;
        self.observe(result)
    }

    pub async fn fetch_optional<O>(&self, statement: SqlStatement) -> Result<Option<O>, sqlx::Error>
    where
        O: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, values) = statement.render();
        debug!(sql = %sql, params = values.len(), "fetch_optional");

        let query = values
            .into_iter()
            .fold(sqlx::query_as::<_, O>(&sql), |query, value| value.bind_as(query));
        let result = query.fetch_optional(&self.pool).await;
        self.observe(result)
    }

    /// Runs a statement and returns the number of affected rows.
    pub async fn execute(&self, statement: SqlStatement) -> Result<u64, sqlx::Error> {
        let (sql, values) = statement.render();
        debug!(sql = %sql, params = values.len(), "execute");

        let query = values
            .into_iter()
            .fold(sqlx::query(&sql), |query, value| value.bind(query));
        let result = query.execute(&self.pool).await;
        self.observe(result).map(|done| done.rows_affected())
    }

    pub fn is_faulted(&self) -> bool {
        self.health.faulted.load(Ordering::SeqCst)
    }

    /// Resolves once the pool has hit an unrecoverable fault.
    pub async fn faulted(&self) {
        if self.is_faulted() {
            return;
        }
        self.health.notify.notified().await;
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn observe<T>(&self, result: Result<T, sqlx::Error>) -> Result<T, sqlx::Error> {
        if let Err(e) = &result {
            if is_fatal(e) && !self.health.faulted.swap(true, Ordering::SeqCst) {
                error!(error = ?e, "Unrecoverable connection pool fault");
                self.health.notify.notify_one();
            }
        }
        result
    }
}

/// Pool-level failures after which the service cannot do its job.
pub fn is_fatal(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_faults_are_fatal() {
        assert!(is_fatal(&sqlx::Error::PoolClosed));
        assert!(is_fatal(&sqlx::Error::WorkerCrashed));
    }

    #[test]
    fn test_request_level_errors_are_not_fatal() {
        assert!(!is_fatal(&sqlx::Error::RowNotFound));
        assert!(!is_fatal(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test]
    async fn test_fatal_error_marks_handle_faulted() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/events")
            .unwrap();
        let db = Database::from_pool(pool);
        let other = db.clone();

        let result: Result<(), sqlx::Error> = db.observe(Err(sqlx::Error::PoolClosed));
        assert!(result.is_err());
        assert!(other.is_faulted());

        // Resolves immediately once faulted.
        other.faulted().await;
    }

    #[tokio::test]
    async fn test_closed_pool_is_reported_as_fault() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/events")
            .unwrap();
        let db = Database::from_pool(pool);
        db.close().await;

        let err = db.ping().await.unwrap_err();
        assert!(matches!(err, sqlx::Error::PoolClosed));
        assert!(db.is_faulted());
    }
}
