//! Connection owner that brings the configured schema up to date on open.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::SqliteConfig;
use crate::error::{Result, TableError};
use crate::schema::Schema;
use crate::table::DatabaseTable;

/// An open SQLite database plus the schema it was opened with.
///
/// Tables handed out by [`Database::table`] borrow the connection; the
/// connection closes when the `Database` is dropped.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    schema: Schema,
}

impl Database {
    /// Open the configured database and create or upgrade its tables.
    ///
    /// On a fresh database (`user_version` 0) every table is created. When the
    /// stored version is lower than the configured one every table is
    /// upgraded, which drops its rows. A newer stored version is an error.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        config.validate()?;
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.db_path)?
        };
        conn.busy_timeout(config.busy_timeout())?;
        info!(path = %config.db_path, version = config.schema_version, "opening sqlite database");

        let database = Self {
            conn,
            schema: config.schema.clone(),
        };
        database.initialize_schema(config.schema_version)?;
        Ok(database)
    }

    pub fn open_in_memory(schema: Schema, version: u32) -> Result<Self> {
        Self::open(&SqliteConfig::in_memory(schema).with_schema_version(version))
    }

    fn initialize_schema(&self, version: u32) -> Result<()> {
        let found = self.schema_version()?;
        if found > version {
            return Err(TableError::SchemaDowngrade {
                found,
                expected: version,
            });
        }
        if found == version {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        for definition in &self.schema.tables {
            let table = DatabaseTable::from_definition(&tx, definition);
            if found == 0 {
                table.create()?;
            } else {
                table.upgrade()?;
            }
        }
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;

        if found == 0 {
            info!(version, tables = self.schema.tables.len(), "schema created");
        } else {
            warn!(from = found, to = version, "schema upgraded, table contents were reset");
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_version(&self) -> Result<u32> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Accessor for a table declared in the schema.
    pub fn table(&self, name: &str) -> Option<DatabaseTable<'_>> {
        self.schema
            .table(name)
            .map(|definition| DatabaseTable::from_definition(&self.conn, definition))
    }
}
