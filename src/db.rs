use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Executor, SqliteConnection, SqlitePool};
use tracing::{error, info, warn};

use crate::config::StoreConfig;
use crate::{AppError, AppResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS prices (\
       id          INTEGER PRIMARY KEY,\
       name        TEXT NOT NULL,\
       category    TEXT NOT NULL,\
       price       TEXT NOT NULL,\
       create_date TEXT NOT NULL\
     )";

/// Open the store described by `config` and make sure the `prices` table exists.
pub async fn open_pool(config: &StoreConfig) -> AppResult<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|err| {
            AppError::persistence("parse_database_url", err)
                .with_context("database_url", config.database_url.clone())
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(opts)
        .await
        .map_err(|err| AppError::persistence("open_pool", err))?;

    log_effective_pragmas(&pool).await;
    ensure_schema(&pool).await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool) -> AppResult<()> {
    pool.execute(SCHEMA)
        .await
        .map_err(|err| AppError::persistence("ensure_schema", err))?;
    Ok(())
}

/// Connection settings as SQLite actually applied them.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EffectivePragmas {
    sqlite_version: String,
    journal_mode: String,
    synchronous: i64,
    foreign_keys: i64,
    busy_timeout_ms: i64,
}

async fn read_effective_pragmas(pool: &SqlitePool) -> EffectivePragmas {
    let (sqlite_version,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let (journal_mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let (synchronous,): (i64,) = sqlx::query_as("PRAGMA synchronous;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    let (foreign_keys,): (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    let (busy_timeout_ms,): (i64,) = sqlx::query_as("PRAGMA busy_timeout;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    EffectivePragmas {
        sqlite_version,
        journal_mode,
        synchronous,
        foreign_keys,
        busy_timeout_ms,
    }
}

async fn log_effective_pragmas(pool: &SqlitePool) {
    let pragmas = read_effective_pragmas(pool).await;

    info!(
        target: "pricebook",
        event = "db_open",
        sqlite_version = %pragmas.sqlite_version,
        journal_mode = %pragmas.journal_mode,
        synchronous = pragmas.synchronous,
        foreign_keys = pragmas.foreign_keys,
        busy_timeout_ms = pragmas.busy_timeout_ms
    );

    if !pragmas.journal_mode.eq_ignore_ascii_case("wal") {
        warn!(
            target: "pricebook",
            event = "db_open_warning",
            msg = "journal_mode != WAL; concurrent readers will block on writers"
        );
    }
}

/// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
///
/// If the returned future is dropped before completion the transaction guard
/// goes with it and sqlx rolls the work back.
pub async fn with_tx<R, F>(pool: &SqlitePool, f: F) -> AppResult<R>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, AppResult<R>>,
{
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| AppError::persistence("tx_begin", err))?;
    info!(target: "pricebook", event = "db_tx_begin");

    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|err| AppError::persistence("tx_commit", err))?;
            info!(target: "pricebook", event = "db_tx_commit");
            Ok(value)
        }
        Err(err) => {
            if let Err(rb) = tx.rollback().await {
                error!(target: "pricebook", event = "db_tx_rollback_failed", error = %rb);
            } else {
                warn!(target: "pricebook", event = "db_tx_rollback", code = %err.code());
            }
            Err(err)
        }
    }
}
