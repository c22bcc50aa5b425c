use std::collections::HashMap;
use std::fmt;

use csv::Error as CsvError;
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use std::io::Error as IoError;
use zip::result::ZipError;

/// A structured application error that can be serialized and surfaced to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Human friendly message that can be returned directly to the caller.
    pub message: String,
    /// Arbitrary key/value pairs that provide additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    /// Optional nested cause that preserves the error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Default code used when an upstream error does not expose a specific code.
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";
    /// Code used for errors created from free-form messages.
    pub const GENERIC_CODE: &'static str = "APP/GENERIC";
    /// The uploaded payload is not a well-formed zip container.
    pub const INVALID_ARCHIVE: &'static str = "IMPORT/INVALID_ARCHIVE";
    /// A CSV member is missing its header row or the header cannot be read.
    pub const UNREADABLE_HEADER: &'static str = "IMPORT/UNREADABLE_HEADER";
    /// The request did not carry an archive at all.
    pub const MISSING_PAYLOAD: &'static str = "IMPORT/MISSING_PAYLOAD";
    /// The request body exceeded the configured upload limit.
    pub const PAYLOAD_TOO_LARGE: &'static str = "IMPORT/PAYLOAD_TOO_LARGE";
    /// A transaction could not begin, execute or commit.
    pub const PERSISTENCE_FAILURE: &'static str = "STORE/PERSISTENCE";
    /// CSV serialization or zip compression failed while exporting.
    pub const ENCODING_ERROR: &'static str = "EXPORT/ENCODING";

    /// Construct a new application error with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn invalid_archive(message: impl Into<String>) -> Self {
        AppError::new(Self::INVALID_ARCHIVE, message)
    }

    pub fn unreadable_header(member: &str) -> Self {
        AppError::new(Self::UNREADABLE_HEADER, "Failed to read CSV header row.")
            .with_context("member", member)
    }

    pub fn missing_payload() -> Self {
        AppError::new(Self::MISSING_PAYLOAD, "Failed to retrieve file.")
    }

    /// Wrap a store-level failure, keeping the original error as the cause.
    pub fn persistence(operation: &'static str, cause: impl Into<AppError>) -> Self {
        AppError::new(Self::PERSISTENCE_FAILURE, "Database operation failed.")
            .with_context("operation", operation)
            .with_cause(cause)
    }

    /// Wrap an export-side serialization failure, keeping the original error as the cause.
    pub fn encoding(operation: &'static str, cause: impl Into<AppError>) -> Self {
        AppError::new(Self::ENCODING_ERROR, "Failed to build export archive.")
            .with_context("operation", operation)
            .with_cause(cause)
    }

    /// Returns the error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the contextual metadata associated with the error.
    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    /// Returns the nested cause if one is present.
    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    /// True when the request itself was at fault (maps to a 4xx response).
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self.code.as_str(),
            Self::INVALID_ARCHIVE
                | Self::UNREADABLE_HEADER
                | Self::MISSING_PAYLOAD
                | Self::PAYLOAD_TOO_LARGE
        )
    }

    /// Adds a contextual key/value pair to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets the nested cause for the error.
    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let code = format!("IO/{:?}", error.kind());
        let mut app_error = AppError::new(code, error.to_string());
        if let Some(os_code) = error.raw_os_error() {
            app_error = app_error.with_context("os_code", os_code.to_string());
        }
        app_error
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            SqlxError::ColumnNotFound(name) => {
                AppError::new("SQLX/COLUMN_NOT_FOUND", format!("Column not found: {name}"))
            }
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                let mut app_error = AppError::new(code, db.message().to_string());
                if let Some(constraint) = db.constraint() {
                    app_error = app_error.with_context("constraint", constraint.to_string());
                }
                app_error
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string())
                    .with_context("column_index", index.to_string())
            }
            SqlxError::Decode(decode_err) => AppError::new("SQLX/DECODE", decode_err.to_string()),
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}

impl From<ZipError> for AppError {
    fn from(error: ZipError) -> Self {
        match error {
            ZipError::Io(err) => AppError::from(err).with_context("source", "zip"),
            ZipError::InvalidArchive(reason) => AppError::new("ZIP/INVALID", reason),
            ZipError::UnsupportedArchive(reason) => AppError::new("ZIP/UNSUPPORTED", reason),
            other => AppError::new("ZIP/ERROR", other.to_string()),
        }
    }
}

impl From<CsvError> for AppError {
    fn from(error: CsvError) -> Self {
        let mut app_error = AppError::new("CSV/ERROR", error.to_string());
        if let Some(position) = error.position() {
            app_error = app_error.with_context("line", position.line().to_string());
        }
        app_error
    }
}
