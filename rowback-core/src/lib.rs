//! Rowback Core - Schema, Value and Dialect Types
//!
//! Data types shared by every Rowback crate: table schemas, column values,
//! dialect capability profiles, configuration, diagnostics and errors.
//! The insert pipeline itself lives in `rowback-insert`.

pub mod config;
pub mod dialect;
pub mod diagnostics;
pub mod error;
pub mod schema;
pub mod value;

pub use config::{InsertConfig, KeyExtrapolation};
pub use dialect::{DefaultValuesForm, DialectProfile, IgnoreSyntax, PlaceholderStyle};
pub use diagnostics::{
    ConsistencyWarning, Diagnostic, DiagnosticsSink, LookupFailure, LookupReason, RecordingSink,
    TracingSink,
};
pub use error::{
    ConfigError, NotFoundError, ReconcileError, ResolutionError, RowbackError, RowbackResult,
    SchemaError, SessionError, SessionResult, ValidationError,
};
pub use schema::{Column, ColumnType, DefaultFn, TableSchema, TableSchemaBuilder};
pub use value::Value;
