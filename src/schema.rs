//! Column and table descriptors, and rendering of `CREATE TABLE` statements.

use serde::{Deserialize, Serialize};

use crate::sqlite::quote_identifier;

/// Name of the standard identifier column.
pub const ID_COLUMN: &str = "_id";

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn create_statement(&self) -> String {
        create_statement(&self.name, &self.columns)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
    CurrentTimestamp,
}

impl DefaultValue {
    fn as_sql(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            // Debug keeps the fractional part so SQLite reads a REAL literal.
            DefaultValue::Real(f) if f.is_finite() => format!("{f:?}"),
            // SQLite has no literal for NaN or infinities.
            DefaultValue::Real(_) => "NULL".to_string(),
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    /// The standard `_id INTEGER PRIMARY KEY AUTOINCREMENT` column.
    pub fn id() -> Self {
        Self::new(ID_COLUMN, DataType::Integer)
            .with_constraint(ColumnConstraint::PrimaryKey)
            .with_constraint(ColumnConstraint::AutoIncrement)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Real)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Text)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Blob)
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn not_null(self) -> Self {
        self.with_constraint(ColumnConstraint::NotNull)
    }

    pub fn unique(self) -> Self {
        self.with_constraint(ColumnConstraint::Unique)
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&ColumnConstraint::PrimaryKey)
    }

    /// Column definition as it appears inside `CREATE TABLE (...)`.
    pub fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.data_type.as_sql());
        // PRIMARY KEY must precede AUTOINCREMENT regardless of declaration order.
        if self.is_primary_key() {
            sql.push_str(" PRIMARY KEY");
            if self.constraints.contains(&ColumnConstraint::AutoIncrement) {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        for constraint in &self.constraints {
            match constraint {
                ColumnConstraint::NotNull => sql.push_str(" NOT NULL"),
                ColumnConstraint::Unique => sql.push_str(" UNIQUE"),
                ColumnConstraint::PrimaryKey | ColumnConstraint::AutoIncrement => {}
            }
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.as_sql());
        }
        sql
    }
}

/// Render the `CREATE TABLE` statement for `name` with `columns` in order.
pub fn create_statement(name: &str, columns: &[ColumnDefinition]) -> String {
    let columns: Vec<String> = columns.iter().map(ColumnDefinition::definition_sql).collect();
    format!("CREATE TABLE {} ({})", quote_identifier(name), columns.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_create_statement_in_column_order() {
        let sql = create_statement(
            "expenses",
            &[
                ColumnDefinition::id(),
                ColumnDefinition::text("title").not_null(),
                ColumnDefinition::real("amount").with_default(DefaultValue::Real(0.0)),
                ColumnDefinition::long("category"),
            ],
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"expenses\" (\"_id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"title\" TEXT NOT NULL, \"amount\" REAL DEFAULT 0.0, \"category\" INTEGER)"
        );
    }

    #[test]
    fn text_defaults_are_escaped() {
        let column = ColumnDefinition::text("label").with_default(DefaultValue::Text("o'clock".into()));
        assert_eq!(column.definition_sql(), "\"label\" TEXT DEFAULT 'o''clock'");
    }

    #[test]
    fn non_finite_real_defaults_render_as_null() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let column = ColumnDefinition::real("ratio").with_default(DefaultValue::Real(value));
            assert_eq!(column.definition_sql(), "\"ratio\" REAL DEFAULT NULL");
        }
    }

    #[test]
    fn constraints_are_not_duplicated() {
        let column = ColumnDefinition::text("code").unique().unique().not_null();
        assert_eq!(column.definition_sql(), "\"code\" TEXT UNIQUE NOT NULL");
    }

    #[test]
    fn schema_finds_tables_by_name() {
        let schema = Schema::new()
            .add_table(TableDefinition::new("a", vec![ColumnDefinition::id()]))
            .add_table(TableDefinition::new("b", vec![ColumnDefinition::id()]));
        assert_eq!(schema.table("b").map(|t| t.name.as_str()), Some("b"));
        assert!(schema.table("c").is_none());
    }
}
