//! Value resolution: the effective value of every column for every row.
//!
//! Precedence, highest first: explicit value, client-side default,
//! inline sequence expression, database default. Resolution happens once
//! per statement and is memoized in [`ResolvedArguments`].

use once_cell::unsync::OnceCell;
use rowback_core::{DialectProfile, RowbackResult, TableSchema, ValidationError, Value};
use std::collections::BTreeMap;

// ============================================================================
// ROW VALUES
// ============================================================================

/// Caller-supplied values for one row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    values: BTreeMap<String, Value>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RowValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// RESOLVED ARGUMENTS
// ============================================================================

/// Effective value of one column in one row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArg {
    /// Sent as a bound parameter.
    Bound(Value),
    /// Rendered inline as the named sequence's next-value expression.
    NextVal(String),
    /// Omitted from the statement; the database computes it.
    DatabaseDefault,
}

impl ResolvedArg {
    pub fn as_bound(&self) -> Option<&Value> {
        match self {
            ResolvedArg::Bound(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_database_default(&self) -> bool {
        matches!(self, ResolvedArg::DatabaseDefault)
    }

    fn same_shape(&self, other: &ResolvedArg) -> bool {
        match (self, other) {
            (ResolvedArg::Bound(_), ResolvedArg::Bound(_)) => true,
            (ResolvedArg::NextVal(a), ResolvedArg::NextVal(b)) => a == b,
            (ResolvedArg::DatabaseDefault, ResolvedArg::DatabaseDefault) => true,
            _ => false,
        }
    }
}

/// Resolved arguments of one row, index-aligned with the schema columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    args: Vec<ResolvedArg>,
}

impl ResolvedRow {
    pub fn args(&self) -> &[ResolvedArg] {
        &self.args
    }

    pub fn get(&self, index: usize) -> Option<&ResolvedArg> {
        self.args.get(index)
    }

    fn same_shape(&self, other: &ResolvedRow) -> bool {
        self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.same_shape(b))
    }
}

/// Resolve the effective value of every column of one row.
pub fn resolve_row(
    schema: &TableSchema,
    profile: &DialectProfile,
    row: &RowValues,
) -> RowbackResult<ResolvedRow> {
    if let Some(unknown) = row.columns().find(|name| schema.column(name).is_none()) {
        return Err(ValidationError::UnknownColumn {
            table: schema.name().to_string(),
            column: unknown.to_string(),
        }
        .into());
    }

    let mut args = Vec::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let arg = if let Some(value) = row.get(column.name()) {
            if column.is_database_generated() {
                return Err(ValidationError::GeneratedColumnAssigned {
                    table: schema.name().to_string(),
                    column: column.name().to_string(),
                }
                .into());
            }
            ResolvedArg::Bound(value.clone())
        } else if let Some(generator) = column.client_default_fn() {
            ResolvedArg::Bound(generator()?)
        } else if let (Some(sequence), Some(_)) =
            (column.sequence_name(), profile.sequence_next_value.as_ref())
        {
            ResolvedArg::NextVal(sequence.to_string())
        } else if column.database_default_expr().is_some()
            || column.is_auto_increment()
            || column.is_database_generated()
        {
            ResolvedArg::DatabaseDefault
        } else if column.is_nullable() {
            ResolvedArg::Bound(Value::Null)
        } else {
            return Err(ValidationError::MissingRequiredValue {
                table: schema.name().to_string(),
                column: column.name().to_string(),
            }
            .into());
        };
        args.push(arg);
    }

    Ok(ResolvedRow { args })
}

/// Resolve every row of a statement.
///
/// All rows must share the first row's shape, since one statement text
/// serves the whole batch.
pub fn resolve_rows(
    schema: &TableSchema,
    profile: &DialectProfile,
    rows: &[RowValues],
) -> RowbackResult<Vec<ResolvedRow>> {
    if rows.is_empty() {
        return Err(ValidationError::EmptyInsert {
            table: schema.name().to_string(),
        }
        .into());
    }

    let resolved = rows
        .iter()
        .map(|row| resolve_row(schema, profile, row))
        .collect::<RowbackResult<Vec<_>>>()?;

    let template = &resolved[0];
    if let Some((index, row)) = resolved
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| !row.same_shape(template))
    {
        let columns = schema
            .columns()
            .iter()
            .zip(row.args())
            .filter(|(_, arg)| !arg.is_database_default())
            .map(|(column, _)| column.name().to_string())
            .collect();
        return Err(ValidationError::BatchInconsistent {
            table: schema.name().to_string(),
            row: index,
            columns,
        }
        .into());
    }

    tracing::debug!(table = %schema.name(), rows = resolved.len(), "Resolved insert arguments");
    Ok(resolved)
}

/// Arguments of a statement, computed on first use and reused afterwards.
#[derive(Debug, Default)]
pub struct ResolvedArguments {
    cell: OnceCell<Vec<ResolvedRow>>,
}

impl ResolvedArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved rows, running `resolve` only if nothing is cached yet.
    /// A failed resolution leaves the cell empty.
    pub fn get_or_resolve<F>(&self, resolve: F) -> RowbackResult<&[ResolvedRow]>
    where
        F: FnOnce() -> RowbackResult<Vec<ResolvedRow>>,
    {
        self.cell.get_or_try_init(resolve).map(Vec::as_slice)
    }

    pub fn get(&self) -> Option<&[ResolvedRow]> {
        self.cell.get().map(Vec::as_slice)
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Drop cached rows after the inputs changed.
    pub fn invalidate(&mut self) {
        self.cell.take();
    }
}

// ============================================================================
// TESTS
// ============================================================================
