use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TableError};
use crate::schema::Schema;

/// Path that opens a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// SQLite database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// Schema definition for the database
    pub schema: Schema,
    /// Version stored in `PRAGMA user_version`. Raising it upgrades every
    /// table, which discards their rows.
    pub schema_version: u32,
    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<String>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
            schema_version: 1,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn in_memory(schema: Schema) -> Self {
        Self::new(IN_MEMORY_PATH, schema)
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_PATH
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(TableError::InvalidConfig("db_path must not be empty".into()));
        }
        if self.schema_version == 0 {
            return Err(TableError::InvalidConfig(
                "schema_version must be at least 1".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for table in &self.schema.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(TableError::InvalidConfig(format!(
                    "table `{}` is defined more than once",
                    table.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, DataType, TableDefinition};

    fn rules_schema() -> Schema {
        Schema::new().add_table(TableDefinition::new(
            "rules",
            vec![ColumnDefinition::id(), ColumnDefinition::text("title")],
        ))
    }

    #[test]
    fn loads_from_json_with_defaults() {
        let config: SqliteConfig = serde_json::from_str(
            r#"{
                "db_path": "rules.db",
                "schema_version": 3,
                "schema": { "tables": [ {
                    "name": "rules",
                    "columns": [
                        { "name": "_id", "data_type": "Integer",
                          "constraints": ["PrimaryKey", "AutoIncrement"] },
                        { "name": "title", "data_type": "Text" }
                    ]
                } ] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.schema_version, 3);
        assert_eq!(config.busy_timeout(), Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));
        assert_eq!(config.schema, rules_schema());
        assert_eq!(config.schema.tables[0].columns[1].data_type, DataType::Text);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(SqliteConfig::new(" ", rules_schema()).validate().is_err());
        assert!(SqliteConfig::in_memory(rules_schema())
            .with_schema_version(0)
            .validate()
            .is_err());

        let duplicated = rules_schema().add_table(TableDefinition::new("rules", vec![]));
        let err = SqliteConfig::in_memory(duplicated).validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
