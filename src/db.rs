use std::time::Duration;

use futures::future::BoxFuture;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    DbErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool from the application configuration.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: cfg.database_url.clone(),
        max_connections: cfg.max_connections,
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with explicit pool settings.
///
/// SQLite gets a single connection: an in-memory SQLite database exists per
/// connection, and file-backed SQLite serializes writers anyway.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let is_sqlite = config.url.starts_with("sqlite");
    let max_connections = if is_sqlite { 1 } else { config.max_connections };

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(max_connections)
        .min_connections(config.min_connections.min(max_connections))
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!(backend = ?pool.get_database_backend(), max_connections, "database connection established");
    Ok(pool)
}

/// Runs all pending migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), ServiceError> {
    Migrator::up(db, None).await?;
    info!("database migrations applied");
    Ok(())
}

/// Whether the backend supports `SELECT ... FOR UPDATE` row locks.
///
/// SQLite has no row-level locks; its single-writer model gives the same
/// guarantee at connection granularity.
pub fn supports_row_locks(backend: DbBackend) -> bool {
    matches!(backend, DbBackend::Postgres | DbBackend::MySql)
}

/// Heuristic for database errors that mean "lost a race", i.e. worth an
/// internal retry rather than surfacing to the caller as-is.
pub fn is_lock_contention(err: &DbErr) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("deadlock")
        || msg.contains("could not serialize")
        || msg.contains("serialization failure")
        || msg.contains("database is locked")
        || msg.contains("lock timeout")
}

/// Executes `f` inside a transaction, committing on success and rolling back
/// on any error. The closure's typed `ServiceError` is passed through
/// unchanged, unlike `TransactionTrait::transaction` which flattens
/// everything into `DbErr`.
pub async fn in_transaction<T, F>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>>,
{
    let txn = db.begin().await?;
    match f(&txn).await {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            let _ = txn.rollback().await;
            Err(err)
        }
    }
}

/// Like [`in_transaction`], but re-runs the whole transaction a bounded
/// number of times when it loses a race on a contended row. Exhausted
/// retries surface as [`ServiceError::ConcurrencyConflict`].
pub async fn in_transaction_with_retries<T, F>(
    db: &DatabaseConnection,
    attempts: u32,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>>,
{
    let attempts = attempts.max(1);
    let mut last_contention: Option<DbErr> = None;

    for attempt in 1..=attempts {
        let txn = db.begin().await?;
        match f(&txn).await {
            Ok(value) => match txn.commit().await {
                Ok(()) => return Ok(value),
                Err(err) if is_lock_contention(&err) && attempt < attempts => {
                    warn!(attempt, error = %err, "commit lost a race, retrying transaction");
                    last_contention = Some(err);
                }
                Err(err) => return Err(err.into()),
            },
            Err(ServiceError::DatabaseError(err))
                if is_lock_contention(&err) && attempt < attempts =>
            {
                let _ = txn.rollback().await;
                warn!(attempt, error = %err, "transaction lost a race, retrying");
                last_contention = Some(err);
            }
            Err(err) => {
                let _ = txn.rollback().await;
                return Err(err);
            }
        }
    }

    Err(ServiceError::ConcurrencyConflict(
        last_contention
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retries exhausted".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_lock_errors_are_contention() {
        let err = DbErr::Custom("database is locked".to_string());
        assert!(is_lock_contention(&err));
    }

    #[test]
    fn plain_errors_are_not_contention() {
        let err = DbErr::Custom("UNIQUE constraint failed".to_string());
        assert!(!is_lock_contention(&err));
    }

    #[test]
    fn sqlite_gets_no_row_locks() {
        assert!(!supports_row_locks(DbBackend::Sqlite));
        assert!(supports_row_locks(DbBackend::Postgres));
    }
}
