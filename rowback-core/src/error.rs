//! Error types for Rowback operations

use thiserror::Error;

/// Schema construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table {table} has no columns")]
    NoColumns { table: String },

    #[error("Duplicate column {column} in table {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("Column {table}.{column} is database-generated and cannot carry a client default")]
    GeneratedWithClientDefault { table: String, column: String },

    #[error("Invalid column name {column:?} in table {table}")]
    InvalidColumnName { table: String, column: String },
}

/// A client-side default generator failed.
///
/// Generators return this type directly, and the resolver hands it back to the
/// caller untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Client-side default failed: {reason}")]
pub struct ResolutionError {
    pub reason: String,
}

impl ResolutionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Pre-execution validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown column {column} for table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Column {table}.{column} is generated by the database and cannot be assigned")]
    GeneratedColumnAssigned { table: String, column: String },

    #[error("Column {table}.{column} has no value and no default")]
    MissingRequiredValue { table: String, column: String },

    #[error("Batch row {row} for table {table} binds a different column set: {columns:?}")]
    BatchInconsistent {
        table: String,
        row: usize,
        columns: Vec<String>,
    },

    #[error("Insert into {table} has no rows")]
    EmptyInsert { table: String },

    #[error("Dialect {dialect} has no insert-ignore syntax")]
    IgnoreUnsupported { dialect: String },
}

/// Failures reported by the active session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Prepare failed: {reason}")]
    Prepare { reason: String },

    #[error("Execution failed: {reason}")]
    Execute { reason: String },

    #[error("Constraint {constraint} violated: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Cursor failed: {reason}")]
    Cursor { reason: String },

    #[error("Session is closed")]
    Closed,
}

/// Reconciliation errors raised only in strict configurations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Insert into {table} affected {expected} rows but {got} generated rows were reported")]
    RowCountMismatch {
        table: String,
        expected: u64,
        got: usize,
    },

    #[error("Insert into {table} of {rows} rows only reported the last generated key")]
    KeysUnavailable { table: String, rows: u64 },
}

/// Column access on a result row that holds nothing for it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("No rows were produced by the insert")]
    NoRows,

    #[error("Column {column} not present in result row")]
    Column { column: String },

    #[error("Table {table} has no single auto-increment column")]
    NoIdentifier { table: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config parse error: {reason}")]
    Parse { reason: String },
}

/// Master error type for all Rowback errors.
#[derive(Debug, Clone, Error)]
pub enum RowbackError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error on {table}: {source} (sql: {sql})")]
    Session {
        table: String,
        sql: String,
        #[source]
        source: SessionError,
    },

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl RowbackError {
    /// Attach the statement text and table name to a session failure.
    pub fn session(table: impl Into<String>, sql: impl Into<String>, source: SessionError) -> Self {
        RowbackError::Session {
            table: table.into(),
            sql: sql.into(),
            source,
        }
    }
}

/// Result type alias for Rowback operations.
pub type RowbackResult<T> = Result<T, RowbackError>;

/// Result type alias for session calls.
pub type SessionResult<T> = Result<T, SessionError>;

// =============================================================================
// TESTS
// =============================================================================
