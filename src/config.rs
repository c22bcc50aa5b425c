//! Process configuration, resolved once at startup from flags or environment.
//!
//! Every field can be given as a command line flag or through its
//! `PRICEBOOK_*` environment variable. The database URL has no default, so a
//! process started without one exits before touching the store.

use std::net::SocketAddr;

use clap::{Args, ValueEnum};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    /// Log line format.
    #[arg(long, env = "PRICEBOOK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

/// Connection parameters for the relational store.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// SQLite connection URL, for example `sqlite://prices.sqlite3`.
    #[arg(long = "database-url", env = "PRICEBOOK_DATABASE_URL")]
    pub database_url: String,

    /// Upper bound on pooled store connections.
    #[arg(long, env = "PRICEBOOK_MAX_CONNECTIONS", default_value_t = 8)]
    pub max_connections: u32,

    /// How long a writer waits for a competing transaction before failing.
    #[arg(long, env = "PRICEBOOK_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    #[arg(long, env = "PRICEBOOK_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Largest accepted upload body, in bytes.
    #[arg(long, env = "PRICEBOOK_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}
