//! Table schema and column descriptors.
//!
//! A [`TableSchema`] is built once and shared read-only (`Arc`) with every
//! insert statement against that table.
//!
//! # Usage
//!
//! ```ignore
//! use rowback_core::{Column, ColumnType, TableSchema};
//!
//! let tasks = TableSchema::builder("tasks")
//!     .column(Column::new("id", ColumnType::Integer).auto_increment())
//!     .column(Column::new("title", ColumnType::Varchar(128)))
//!     .column(Column::new("description", ColumnType::Text).nullable())
//!     .column(Column::new("isCompleted", ColumnType::Boolean).default(false))
//!     .build()?;
//! ```

use crate::error::{ResolutionError, SchemaError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Client-side default generator, invoked once per row that omits the column.
pub type DefaultFn = Arc<dyn Fn() -> Result<Value, ResolutionError> + Send + Sync>;

/// Declared SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    BigInt,
    Float,
    Boolean,
    Text,
    Varchar(u32),
    Bytes,
    Uuid,
    Timestamp,
    Json,
}

impl ColumnType {
    pub fn sql_name(&self) -> String {
        match self {
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(n) => format!("VARCHAR({})", n),
            ColumnType::Bytes => "BYTEA".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSON".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

// ============================================================================
// COLUMN DESCRIPTOR
// ============================================================================

/// Immutable description of one column.
#[derive(Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    database_default: Option<String>,
    client_default: Option<DefaultFn>,
    auto_increment: bool,
    sequence: Option<String>,
    database_generated: bool,
}

impl Column {
    /// A non-nullable column with no defaults.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            database_default: None,
            client_default: None,
            auto_increment: false,
            sequence: None,
            database_generated: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Literal default known on both sides: the client fills it in and the
    /// DDL carries it as the database default.
    pub fn default(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        let literal = sql_literal(&value);
        self.client_default(move || Ok(value.clone()))
            .database_default(literal)
    }

    pub fn client_default<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Result<Value, ResolutionError> + Send + Sync + 'static,
    {
        self.client_default = Some(Arc::new(generator));
        self
    }

    /// Default computed by the database engine (SQL expression text).
    pub fn database_default(mut self, expression: impl Into<String>) -> Self {
        self.database_default = Some(expression.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Auto-increment backed by a named sequence.
    pub fn sequence(mut self, name: impl Into<String>) -> Self {
        self.auto_increment = true;
        self.sequence = Some(name.into());
        self
    }

    /// Value is always computed by the database (generated/computed column).
    pub fn database_generated(mut self) -> Self {
        self.database_generated = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn database_default_expr(&self) -> Option<&str> {
        self.database_default.as_deref()
    }

    pub fn client_default_fn(&self) -> Option<&DefaultFn> {
        self.client_default.as_ref()
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn sequence_name(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    pub fn is_database_generated(&self) -> bool {
        self.database_generated
    }

    /// True when neither side supplies a default.
    pub fn has_no_default(&self) -> bool {
        self.database_default.is_none() && self.client_default.is_none()
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("column_type", &self.column_type)
            .field("nullable", &self.nullable)
            .field("database_default", &self.database_default)
            .field("client_default", &self.client_default.as_ref().map(|_| "<fn>"))
            .field("auto_increment", &self.auto_increment)
            .field("sequence", &self.sequence)
            .field("database_generated", &self.database_generated)
            .finish()
    }
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Uuid(u) => format!("'{}'", u),
        Value::Timestamp(ts) => format!("'{}'", ts.to_rfc3339()),
        Value::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("X'{}'", hex)
        }
    }
}

// ============================================================================
// TABLE SCHEMA
// ============================================================================

/// Ordered, name-unique set of columns.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn builder(name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn auto_increment_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.auto_increment)
    }

    /// The auto-increment column when there is exactly one.
    pub fn single_auto_increment(&self) -> Option<&Column> {
        let mut iter = self.auto_increment_columns();
        match (iter.next(), iter.next()) {
            (Some(column), None) => Some(column),
            _ => None,
        }
    }

    pub fn has_database_generated(&self) -> bool {
        self.columns.iter().any(|c| c.database_generated)
    }

    /// Columns whose values only the database knows after an insert:
    /// auto-increment columns, then database-generated ones, in schema order.
    pub fn identifier_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.auto_increment || c.database_generated)
    }
}

/// Builder validating column uniqueness and flag combinations.
#[derive(Debug)]
pub struct TableSchemaBuilder {
    name: String,
    columns: Vec<Column>,
}

impl TableSchemaBuilder {
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<Arc<TableSchema>, SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns { table: self.name });
        }

        for (i, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(SchemaError::InvalidColumnName {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
            if column.database_generated && column.client_default.is_some() {
                return Err(SchemaError::GeneratedWithClientDefault {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        Ok(Arc::new(TableSchema {
            name: self.name,
            columns: self.columns,
        }))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks() -> Arc<TableSchema> {
        TableSchema::builder("tasks")
            .column(Column::new("id", ColumnType::Integer).auto_increment())
            .column(Column::new("title", ColumnType::Varchar(128)))
            .column(Column::new("description", ColumnType::Text).nullable())
            .column(Column::new("isCompleted", ColumnType::Boolean).default(false))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_preserves_column_order() {
        let schema = tasks();
        let names: Vec<&str> = schema.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["id", "title", "description", "isCompleted"]);
        assert_eq!(schema.index_of("description"), Some(2));
    }

    #[test]
    fn test_literal_default_sets_both_sides() {
        let schema = tasks();
        let column = schema.column("isCompleted").unwrap();
        assert_eq!(column.database_default_expr(), Some("FALSE"));
        let generator = column.client_default_fn().unwrap();
        assert_eq!(generator().unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = TableSchema::builder("t")
            .column(Column::new("a", ColumnType::Integer))
            .column(Column::new("a", ColumnType::Text))
            .build();
        assert!(matches!(result, Err(SchemaError::DuplicateColumn { .. })));
    }

    #[test]
    fn test_generated_column_with_client_default_rejected() {
        let result = TableSchema::builder("t")
            .column(Column::new("total", ColumnType::Integer).database_generated().default(1))
            .build();
        assert!(matches!(
            result,
            Err(SchemaError::GeneratedWithClientDefault { .. })
        ));
    }

    #[test]
    fn test_empty_table_rejected() {
        let result = TableSchema::builder("t").build();
        assert!(matches!(result, Err(SchemaError::NoColumns { .. })));
    }

    #[test]
    fn test_sequence_implies_auto_increment() {
        let column = Column::new("id", ColumnType::BigInt).sequence("tasks_id_seq");
        assert!(column.is_auto_increment());
        assert_eq!(column.sequence_name(), Some("tasks_id_seq"));
    }

    #[test]
    fn test_single_auto_increment() {
        assert_eq!(tasks().single_auto_increment().map(|c| c.name()), Some("id"));

        let two = TableSchema::builder("t")
            .column(Column::new("a", ColumnType::Integer).auto_increment())
            .column(Column::new("b", ColumnType::Integer).auto_increment())
            .build()
            .unwrap();
        assert!(two.single_auto_increment().is_none());
    }

    #[test]
    fn test_identifier_columns_include_database_generated() {
        let orders = TableSchema::builder("orders")
            .column(Column::new("id", ColumnType::Integer).auto_increment())
            .column(Column::new("name", ColumnType::Text))
            .column(Column::new("total", ColumnType::Integer).database_generated())
            .build()
            .unwrap();
        let names: Vec<&str> = orders.identifier_columns().map(|c| c.name()).collect();
        assert_eq!(names, vec!["id", "total"]);
        assert_eq!(tasks().identifier_columns().count(), 1);
    }

    #[test]
    fn test_text_literal_escapes_quotes() {
        let column = Column::new("note", ColumnType::Text).default("it's");
        assert_eq!(column.database_default_expr(), Some("'it''s'"));
    }
}
