//! Typed `SELECT` builder.
//!
//! A [`Select`] renders to a [`SqlQuery`]: identifiers are quoted and every
//! operand becomes a positional parameter, so caller-supplied text never ends
//! up inside the statement itself.

use std::fmt;

use crate::schema::ID_COLUMN;
use crate::sqlite::{quote_identifier, SqlQuery, Value};

/// Query operators for building advanced queries
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterThanOrEqual(Value),
    LessThan(Value),
    LessThanOrEqual(Value),
    /// Raw `LIKE` pattern; `%` and `_` keep their wildcard meaning.
    Like(String),
    /// Matches values starting with the given text, wildcards included literally.
    StartsWith(String),
    In(Vec<Value>),
    IsNull,
    IsNotNull,
}

/// A selected column, optionally renamed in the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", quote_identifier(&self.name), quote_identifier(alias)),
            None => quote_identifier(&self.name),
        }
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}

/// Query builder for composable, immutable queries
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    fields: Vec<Field>,
    table: Option<String>,
    id_column: String,
    conditions: Vec<(String, QueryOperator)>,
    order_by: Vec<(String, bool)>, // (field, is_ascending)
    limit: Option<u32>,
    offset: Option<u32>,
}

impl Select {
    /// Select `fields`; an empty list selects `*`.
    pub fn fields<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            table: None,
            id_column: ID_COLUMN.to_string(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Column used by [`Select::where_id`]. Defaults to `_id`.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_condition(mut self, field: &str, op: QueryOperator) -> Self {
        self.conditions.push((field.to_string(), op));
        self
    }

    pub fn where_id(self, id: i64) -> Self {
        let column = self.id_column.clone();
        self.with_condition(&column, QueryOperator::Equal(Value::Integer(id)))
    }

    pub fn order_by(mut self, field: &str, ascending: bool) -> Self {
        self.order_by.push((field.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn to_sql(&self) -> SqlQuery {
        let mut params = Vec::new();
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.iter().map(Field::to_sql).collect::<Vec<_>>().join(", ")
        };
        let mut sql = format!("SELECT {fields}");
        if let Some(table) = &self.table {
            sql.push_str(" FROM ");
            sql.push_str(&quote_identifier(table));
        }

        if !self.conditions.is_empty() {
            let predicates: Vec<String> = self
                .conditions
                .iter()
                .map(|(field, op)| render_condition(field, op, &mut params))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(field, asc)| {
                    format!("{} {}", quote_identifier(field), if *asc { "ASC" } else { "DESC" })
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        SqlQuery::new(&sql).with_params(params)
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql().statement)
    }
}

fn render_condition(field: &str, op: &QueryOperator, params: &mut Vec<Value>) -> String {
    let column = quote_identifier(field);
    let mut bind = |value: Value| {
        params.push(value);
        format!("?{}", params.len())
    };
    match op {
        QueryOperator::Equal(v) => format!("{column} = {}", bind(v.clone())),
        QueryOperator::NotEqual(v) => format!("{column} <> {}", bind(v.clone())),
        QueryOperator::GreaterThan(v) => format!("{column} > {}", bind(v.clone())),
        QueryOperator::GreaterThanOrEqual(v) => format!("{column} >= {}", bind(v.clone())),
        QueryOperator::LessThan(v) => format!("{column} < {}", bind(v.clone())),
        QueryOperator::LessThanOrEqual(v) => format!("{column} <= {}", bind(v.clone())),
        QueryOperator::Like(pattern) => format!("{column} LIKE {}", bind(Value::Text(pattern.clone()))),
        QueryOperator::StartsWith(prefix) => {
            let pattern = format!("{}%", escape_like(prefix));
            format!("{column} LIKE {} ESCAPE '\\'", bind(Value::Text(pattern)))
        }
        QueryOperator::In(values) => {
            let placeholders: Vec<String> = values.iter().map(|v| bind(v.clone())).collect();
            format!("{column} IN ({})", placeholders.join(", "))
        }
        QueryOperator::IsNull => format!("{column} IS NULL"),
        QueryOperator::IsNotNull => format!("{column} IS NOT NULL"),
    }
}

/// Escape `LIKE` wildcards so `text` matches literally under `ESCAPE '\'`.
pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
