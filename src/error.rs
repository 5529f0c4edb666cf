//! Error types for table access.
//!
//! Errors raised by SQLite are carried unchanged in [`TableError::Sqlite`].
//! Nothing in this crate retries a failed statement.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = TableError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TableError {
    /// The engine rejected a statement.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("table `{table}` has no column named `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("column `{column}` of table `{table}` is not a text column")]
    NotTextColumn { table: String, column: String },

    /// A batched insert was given a different column set than the one the
    /// prepared statement was built for.
    #[error("batched insert into `{table}` was prepared for columns {expected:?}, got {found:?}")]
    InsertColumnsChanged {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A listener failed after a write was committed.
    #[error("listener failed after write to `{table}`: {source}")]
    Listener {
        table: String,
        row_id: Option<i64>,
        #[source]
        source: anyhow::Error,
    },

    #[error("database schema version {found} is newer than configured version {expected}")]
    SchemaDowngrade { found: u32, expected: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
