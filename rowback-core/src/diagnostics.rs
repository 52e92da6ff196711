//! Diagnostics sink for recoverable conditions.
//!
//! Lookup failures and count mismatches do not stop an insert. They are
//! handed to a [`DiagnosticsSink`] passed in by the caller: [`TracingSink`]
//! in production, [`RecordingSink`] when a test needs to assert on them.

use std::sync::Mutex;
use thiserror::Error;

/// Generated-row count disagrees with the affected-row count.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Insert into {table} affected {inserted} rows but {generated} generated rows were reported")]
pub struct ConsistencyWarning {
    pub table: String,
    pub inserted: u64,
    pub generated: usize,
}

/// Why a column could not be read from a generated-value cursor row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupReason {
    /// No cursor field is labelled with the column name.
    MissingField,
    /// The field exists but the driver failed to produce its value.
    FetchFailed(String),
}

/// A schema column that could not be matched in one cursor row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Generated value for {table}.{column} unavailable in row {row}: {reason:?}")]
pub struct LookupFailure {
    pub table: String,
    pub column: String,
    pub row: usize,
    pub reason: LookupReason,
}

/// Receiver for non-fatal diagnostics.
pub trait DiagnosticsSink {
    fn consistency_warning(&self, warning: &ConsistencyWarning);

    fn lookup_failure(&self, failure: &LookupFailure);
}

/// Forwards diagnostics to `tracing` at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn consistency_warning(&self, warning: &ConsistencyWarning) {
        tracing::warn!(
            table = %warning.table,
            inserted = warning.inserted,
            generated = warning.generated,
            "Generated row count does not match inserted row count"
        );
    }

    fn lookup_failure(&self, failure: &LookupFailure) {
        tracing::warn!(
            table = %failure.table,
            column = %failure.column,
            row = failure.row,
            reason = ?failure.reason,
            "Generated value lookup failed, column skipped"
        );
    }
}

/// A diagnostic captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Consistency(ConsistencyWarning),
    Lookup(LookupFailure),
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn consistency_warnings(&self) -> Vec<ConsistencyWarning> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::Consistency(w) => Some(w),
                Diagnostic::Lookup(_) => None,
            })
            .collect()
    }

    pub fn lookup_failures(&self) -> Vec<LookupFailure> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Diagnostic::Lookup(f) => Some(f),
                Diagnostic::Consistency(_) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    fn push(&self, event: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl DiagnosticsSink for RecordingSink {
    fn consistency_warning(&self, warning: &ConsistencyWarning) {
        self.push(Diagnostic::Consistency(warning.clone()));
    }

    fn lookup_failure(&self, failure: &LookupFailure) {
        self.push(Diagnostic::Lookup(failure.clone()));
    }
}
