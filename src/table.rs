//! Accessor for a single logical table.
//!
//! A [`DatabaseTable`] borrows a connection it does not own and translates
//! method calls into SQL. All calls are synchronous; errors from SQLite are
//! returned unchanged and never retried.

use std::sync::Arc;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Statement};
use tracing::{debug, info, warn};

use crate::error::{Result, TableError};
use crate::listener::{ListenerId, ListenerRegistry, TableListener};
use crate::query::{Field, QueryOperator, Select};
use crate::rows::{Row, Rows};
use crate::schema::{create_statement, ColumnDefinition, DataType, TableDefinition};
use crate::sqlite::{quote_identifier, RowValues, SqlQuery};

/// SQLite's implicit row identifier, used when no primary key is declared.
const ROWID: &str = "rowid";

pub struct DatabaseTable<'conn> {
    name: String,
    conn: &'conn Connection,
    columns: Vec<ColumnDefinition>,
    listeners: ListenerRegistry,
    insert: Option<PreparedInsert<'conn>>,
}

/// Prepared `INSERT` reused by [`DatabaseTable::insert_with_helper`].
///
/// Parameter `?n` binds `columns[n - 1]`.
struct PreparedInsert<'conn> {
    stmt: Statement<'conn>,
    columns: Vec<String>,
    rows: u64,
}

impl<'conn> DatabaseTable<'conn> {
    pub fn new(name: impl Into<String>, conn: &'conn Connection, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            conn,
            columns,
            listeners: ListenerRegistry::new(),
            insert: None,
        }
    }

    pub fn from_definition(conn: &'conn Connection, definition: &TableDefinition) -> Self {
        Self::new(definition.name.clone(), conn, definition.columns.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// The first primary-key column, or `rowid` if none is declared.
    pub fn id_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.is_primary_key())
            .map_or(ROWID, |c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    // --- schema lifecycle ---

    pub fn create(&self) -> Result<()> {
        let sql = create_statement(&self.name, &self.columns);
        debug!(table = %self.name, %sql, "creating table");
        self.conn.execute(&sql, params![])?;
        info!(table = %self.name, columns = self.columns.len(), "table created");
        Ok(())
    }

    /// Drop the table and create it again. Every stored row is lost.
    pub fn upgrade(&self) -> Result<()> {
        warn!(table = %self.name, "dropping table for upgrade, existing rows are discarded");
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(&self.name)), params![])?;
        self.create()
    }

    /// Delete every row, keeping the table.
    pub fn clear(&mut self) -> Result<usize> {
        let deleted = self
            .conn
            .execute(&format!("DELETE FROM {}", quote_identifier(&self.name)), params![])?;
        debug!(table = %self.name, deleted, "table cleared");
        self.notify_listeners(None)?;
        Ok(deleted)
    }

    // --- reads ---

    pub fn query_all(&self) -> Result<Rows> {
        self.query(&self.select())
    }

    pub fn query_all_columns(&self, columns: &[&str]) -> Result<Rows> {
        let select = self.select_columns(columns)?;
        self.query(&select)
    }

    /// Rows whose `filter_column` starts with `prefix`.
    ///
    /// The prefix is bound as a parameter with `LIKE` wildcards escaped.
    /// Matching follows SQLite `LIKE`, which ignores ASCII case.
    pub fn query_filtered_by_text_column(
        &self,
        columns: &[&str],
        filter_column: &str,
        prefix: &str,
    ) -> Result<Rows> {
        let filter = self.column(filter_column)?;
        if filter.data_type != DataType::Text {
            return Err(TableError::NotTextColumn {
                table: self.name.clone(),
                column: filter_column.to_string(),
            });
        }
        let select = self
            .select_columns(columns)?
            .with_condition(filter_column, QueryOperator::StartsWith(prefix.to_string()));
        self.query(&select)
    }

    pub fn raw_query(&self, sql: &str) -> Result<Rows> {
        self.execute_sql(&SqlQuery::new(sql))
    }

    pub fn execute_sql(&self, query: &SqlQuery) -> Result<Rows> {
        debug!(table = %self.name, sql = %query.statement, params = query.params.len(), "executing query");
        let mut stmt = self.conn.prepare(&query.statement)?;
        Ok(Rows::read(&mut stmt, params_from_iter(query.params.iter()))?)
    }

    pub fn query(&self, select: &Select) -> Result<Rows> {
        self.execute_sql(&select.to_sql())
    }

    /// Every declared column, with the identifier column renamed to `alias`.
    pub fn query_all_with_id_alias(&self, alias: &str) -> Result<Rows> {
        let id = self.id_column();
        let mut fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| {
                let field = Field::new(c.name.clone());
                if c.name == id {
                    field.alias(alias)
                } else {
                    field
                }
            })
            .collect();
        if !self.columns.iter().any(ColumnDefinition::is_primary_key) {
            fields.insert(0, Field::new(ROWID).alias(alias));
        }
        self.query(&Select::fields(fields).from(self.name.clone()))
    }

    pub fn query_by_id(&self, id: i64) -> Result<Rows> {
        self.query(&self.select().where_id(id))
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Row>> {
        Ok(self.query_by_id(id)?.into_iter().next())
    }

    // --- writes ---

    /// Insert one row and return its id. Listeners run once the engine has
    /// accepted the row.
    pub fn insert(&mut self, values: &RowValues) -> Result<i64> {
        self.check_columns(values.columns())?;
        let sql = self.insert_statement(values.columns());
        debug!(table = %self.name, %sql, "inserting row");
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))?;
        let row_id = self.conn.last_insert_rowid();
        self.notify_listeners(Some(row_id))?;
        Ok(row_id)
    }

    /// Insert through a prepared statement kept open until
    /// [`finish_insert`](Self::finish_insert).
    ///
    /// The first call fixes the column set. Later calls must provide exactly
    /// the same columns.
    pub fn insert_with_helper(&mut self, values: &RowValues) -> Result<i64> {
        let prepared = match self.insert.take() {
            Some(prepared) => prepared,
            None => self.prepare_insert(values)?,
        };
        let prepared = self.insert.insert(prepared);
        if !prepared.columns.iter().map(String::as_str).eq(values.columns()) {
            return Err(TableError::InsertColumnsChanged {
                table: self.name.clone(),
                expected: prepared.columns.clone(),
                found: values.columns().map(String::from).collect(),
            });
        }
        let bound = prepared.columns.iter().map(|c| values.get(c));
        let row_id = prepared.stmt.insert(params_from_iter(bound))?;
        prepared.rows += 1;
        self.notify_listeners(Some(row_id))?;
        Ok(row_id)
    }

    /// Release the prepared insert, returning how many rows went through it.
    /// Does nothing when no batched insert is open.
    pub fn finish_insert(&mut self) -> Result<u64> {
        let Some(prepared) = self.insert.take() else {
            return Ok(0);
        };
        debug!(table = %self.name, rows = prepared.rows, "finishing batched insert");
        prepared.stmt.finalize()?;
        Ok(prepared.rows)
    }

    pub fn has_pending_insert(&self) -> bool {
        self.insert.is_some()
    }

    fn prepare_insert(&self, values: &RowValues) -> Result<PreparedInsert<'conn>> {
        self.check_columns(values.columns())?;
        let columns: Vec<String> = values.columns().map(String::from).collect();
        let sql = self.insert_statement(columns.iter().map(String::as_str));
        debug!(table = %self.name, %sql, "preparing batched insert");
        let conn = self.conn;
        let stmt = conn.prepare(&sql)?;
        Ok(PreparedInsert {
            stmt,
            columns,
            rows: 0,
        })
    }

    fn insert_statement<'a>(&self, columns: impl Iterator<Item = &'a str>) -> String {
        let table = quote_identifier(&self.name);
        let columns: Vec<String> = columns.map(quote_identifier).collect();
        if columns.is_empty() {
            return format!("INSERT INTO {table} DEFAULT VALUES");
        }
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn check_columns<'a>(&self, mut names: impl Iterator<Item = &'a str>) -> Result<()> {
        names.try_for_each(|name| self.column(name).map(|_| ()))
    }

    // --- introspection ---

    /// Whether the table is present in the schema catalog. Table names
    /// compare case-insensitively, as SQLite resolves them.
    pub fn exists(&self) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [&self.name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_rows(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.name));
        let count: i64 = self.conn.query_row(&sql, params![], |row| row.get(0))?;
        Ok(count as u64)
    }

    // --- query building ---

    /// `SELECT` over every declared column of this table.
    pub fn select(&self) -> Select {
        Select::fields(self.columns.iter().map(|c| c.name.clone()))
            .from(self.name.clone())
            .with_id_column(self.id_column())
    }

    pub fn select_columns(&self, columns: &[&str]) -> Result<Select> {
        self.check_columns(columns.iter().copied())?;
        Ok(Select::fields(columns.iter().copied())
            .from(self.name.clone())
            .with_id_column(self.id_column()))
    }

    // --- listeners ---

    /// Register `listener` for write notifications.
    ///
    /// Only a weak reference is kept: the caller must hold on to the `Arc`
    /// for as long as notifications are wanted. Passing a temporary such as
    /// `&Arc::new(closure)` registers a listener that is already gone and
    /// never fires.
    pub fn add_listener<L: TableListener + 'static>(&mut self, listener: &Arc<L>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify_listeners(&mut self, row_id: Option<i64>) -> Result<()> {
        self.listeners
            .notify(&self.name)
            .map_err(|source| TableError::Listener {
                table: self.name.clone(),
                row_id,
                source,
            })
    }
}

impl Drop for DatabaseTable<'_> {
    fn drop(&mut self) {
        if let Some(prepared) = &self.insert {
            warn!(
                table = %self.name,
                rows = prepared.rows,
                "batched insert dropped without finish_insert"
            );
        }
    }
}

impl std::fmt::Debug for DatabaseTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseTable")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("listeners", &self.listeners)
            .field("pending_insert", &self.insert.is_some())
            .finish()
    }
}
