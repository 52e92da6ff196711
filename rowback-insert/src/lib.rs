//! Rowback Insert - Statement Execution and Generated-Value Reconciliation
//!
//! Resolves row values, renders a parameterized INSERT for the target
//! dialect, runs it on an active session and turns whatever the driver
//! reports back into uniform result rows.
//!
//! Pipeline: [`resolver`] → [`builder`] → [`executor`] → [`reconciler`] →
//! [`materializer`]. Most callers only need [`InsertStatement`],
//! [`BatchInsertStatement`] or the [`insert`] family of functions.

pub mod builder;
pub mod executor;
pub mod materializer;
pub mod reconciler;
pub mod resolver;
pub mod statement;

pub use builder::{render_insert, RenderedInsert};
pub use executor::{execute_insert, key_request, returning_columns, InsertContext};
pub use materializer::{materialize, InsertOutcome, ResultRow};
pub use reconciler::{GeneratedValues, Reconciler};
pub use resolver::{
    resolve_row, resolve_rows, ResolvedArg, ResolvedArguments, ResolvedRow, RowValues,
};
pub use statement::{
    insert, insert_and_get_id, insert_batch, BatchInsertStatement, InsertStatement,
};

// Re-export the types every caller touches.
pub use rowback_core::{
    DialectProfile, InsertConfig, RowbackError, RowbackResult, TableSchema, TracingSink, Value,
};
