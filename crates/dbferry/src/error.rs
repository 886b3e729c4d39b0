//! Error types for the migration engine.

use thiserror::Error;

/// Main error type for migration and export operations.
///
/// The taxonomy mirrors how failures propagate through a job:
///
/// - [`Validation`](FerryError::Validation) and
///   [`UnsupportedBackend`](FerryError::UnsupportedBackend) are rejected at
///   the boundary before a job exists.
/// - [`Connection`](FerryError::Connection) and the driver wrappers are fatal
///   to the job that raised them; the job transitions to `failed`.
/// - [`Unit`](FerryError::Unit) is scoped to a single table, collection or
///   key; it is logged and the object is skipped.
/// - [`Stream`](FerryError::Stream) aborts an export and destroys the sink.
#[derive(Error, Debug)]
pub enum FerryError {
    /// Malformed or backend-mismatched connection string.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No adapter registered for the requested backend identifier.
    #[error("Unsupported database type: {0}")]
    UnsupportedBackend(String),

    /// Source or target unreachable, or an admin-level operation was denied.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure scoped to one schema object, row batch or key.
    #[error("Error processing {object}: {message}")]
    Unit { object: String, message: String },

    /// Archive or sink failure during export.
    #[error("Stream error: {0}")]
    Stream(String),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// MongoDB driver error.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Redis driver error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Zip container error during export.
    #[error("Archive error: {0}")]
    Zip(#[from] async_zip::error::ZipError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (sink writes, flushes).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FerryError {
    /// Create a Connection error with context about where it occurred.
    pub fn connection(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        FerryError::Connection(format!("{}: {}", context.into(), err))
    }

    /// Create a Unit error for a single schema object or key.
    pub fn unit(object: impl Into<String>, message: impl Into<String>) -> Self {
        FerryError::Unit {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Whether this error is recoverable at the per-object level.
    ///
    /// Unit errors are logged and skipped; everything else is fatal to the
    /// job that raised it.
    pub fn is_per_unit(&self) -> bool {
        matches!(self, FerryError::Unit { .. })
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, FerryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_helper_formats_context() {
        let err = FerryError::connection("connecting to source", "refused");
        assert_eq!(
            err.to_string(),
            "Connection error: connecting to source: refused"
        );
    }

    #[test]
    fn test_unit_error_is_per_unit() {
        let err = FerryError::unit("users", "duplicate key");
        assert!(err.is_per_unit());
        assert_eq!(err.to_string(), "Error processing users: duplicate key");

        let fatal = FerryError::Connection("down".into());
        assert!(!fatal.is_per_unit());
    }
}
