//! Table accessors over SQLite.
//!
//! # Intention
//!
//! - Wrap one logical table per [`DatabaseTable`]: schema lifecycle, reads,
//!   writes, row counting and typed `SELECT` building.
//! - Notify registered [`TableListener`]s after every successful write.
//! - Keep SQLite in charge of storage, transactions and locking.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - Accessors borrow a connection; opening and closing it is the job of the
//!   caller or of [`Database`].
//! - Caller-supplied values always travel as bound parameters.

pub mod config;
pub mod database;
pub mod error;
pub mod listener;
pub mod query;
pub mod rows;
pub mod schema;
pub mod sqlite;
pub mod table;

pub use config::SqliteConfig;
pub use database::Database;
pub use error::{Result, TableError};
pub use listener::{ListenerId, TableListener};
pub use query::{Field, QueryOperator, Select};
pub use rows::{Row, Rows};
pub use schema::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, Schema, TableDefinition, ID_COLUMN,
};
pub use sqlite::{RowValues, SqlQuery, Value};
pub use table::DatabaseTable;

pub use rusqlite::Connection;
