//! Generated-value reconciliation.
//!
//! Turns whatever the driver reported after an insert into one
//! column-name → value map per inserted row. Drivers differ in what they
//! report: every column or only identifiers, one row per insert or only the
//! last, labelled fields or positional ones. Fields that cannot be matched
//! are reported to the diagnostics sink and skipped.

use rowback_core::{
    Column, ConsistencyWarning, DiagnosticsSink, DialectProfile, InsertConfig, KeyExtrapolation,
    LookupFailure, LookupReason, ReconcileError, RowbackError, RowbackResult, TableSchema, Value,
};
use rowback_session::Cursor;
use std::collections::BTreeMap;

/// Database-reported values of one inserted row.
pub type GeneratedValues = BTreeMap<String, Value>;

/// Reconciles a generated-value cursor against a table schema.
pub struct Reconciler<'a> {
    schema: &'a TableSchema,
    profile: &'a DialectProfile,
    config: &'a InsertConfig,
    sink: &'a dyn DiagnosticsSink,
    ignore: bool,
    statement: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        schema: &'a TableSchema,
        profile: &'a DialectProfile,
        config: &'a InsertConfig,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            schema,
            profile,
            config,
            sink,
            ignore: false,
            statement: "",
        }
    }

    /// The statement ran in insert-ignore mode.
    pub fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    /// Statement text attached to cursor failures.
    pub fn statement(mut self, sql: &'a str) -> Self {
        self.statement = sql;
        self
    }

    /// Build one generated-value map per inserted row.
    ///
    /// The cursor is consumed and dropped before this returns, on every path.
    pub fn reconcile(
        &self,
        inserted: i64,
        cursor: Option<Box<dyn Cursor + '_>>,
    ) -> RowbackResult<Vec<GeneratedValues>> {
        if inserted <= 0 {
            return Ok(Vec::new());
        }

        let mut maps = match cursor {
            Some(mut cursor) => self.collect(&mut *cursor)?,
            None => Vec::new(),
        };

        self.backfill(inserted, &mut maps)?;
        self.check_consistency(inserted, &maps)?;

        tracing::debug!(
            table = %self.schema.name(),
            inserted,
            generated = maps.len(),
            "Reconciled generated values"
        );
        Ok(maps)
    }

    fn expected_columns(&self) -> Vec<&'a Column> {
        if self.profile.supports_only_identifiers_in_generated_keys {
            self.schema.identifier_columns().collect()
        } else {
            self.schema.columns().iter().collect()
        }
    }

    fn collect(&self, cursor: &mut dyn Cursor) -> RowbackResult<Vec<GeneratedValues>> {
        let expected = self.expected_columns();
        let positional = self.schema.single_auto_increment();
        let mut maps = Vec::new();

        while cursor
            .advance()
            .map_err(|e| RowbackError::session(self.schema.name(), self.statement, e))?
        {
            let row = maps.len();
            let mut map = GeneratedValues::new();

            for column in &expected {
                match fetch_column(&*cursor, column.name()) {
                    Ok(value) => {
                        map.insert(
                            column.name().to_string(),
                            value.coerce(column.column_type()),
                        );
                    }
                    Err(reason) => self.lookup_failed(column, row, reason),
                }
            }

            if map.is_empty() {
                if let Some(column) = positional {
                    if cursor.field_count() > 0 {
                        match cursor.field(0) {
                            Ok(value) => {
                                map.insert(
                                    column.name().to_string(),
                                    value.coerce(column.column_type()),
                                );
                            }
                            Err(e) => {
                                self.lookup_failed(column, row, LookupReason::FetchFailed(e.to_string()))
                            }
                        }
                    }
                }
            }

            maps.push(map);
        }

        Ok(maps)
    }

    fn lookup_failed(&self, column: &Column, row: usize, reason: LookupReason) {
        self.sink.lookup_failure(&LookupFailure {
            table: self.schema.name().to_string(),
            column: column.name().to_string(),
            row,
            reason,
        });
    }

    /// Drivers that report only the last key of a batch leave earlier rows
    /// without one. Contiguous allocation lets us count down from it.
    fn backfill(&self, inserted: i64, maps: &mut Vec<GeneratedValues>) -> RowbackResult<()> {
        if inserted <= 1 || maps.is_empty() || self.profile.supports_multiple_generated_keys {
            return Ok(());
        }
        let Some(column) = self.schema.single_auto_increment() else {
            return Ok(());
        };
        if maps.len() as i64 >= inserted {
            return Ok(());
        }

        match self.config.key_extrapolation {
            KeyExtrapolation::Refuse => Err(ReconcileError::KeysUnavailable {
                table: self.schema.name().to_string(),
                rows: inserted as u64,
            }
            .into()),
            KeyExtrapolation::Contiguous => {
                let Some(mut id) = maps[0].get(column.name()).and_then(Value::as_i64) else {
                    return Ok(());
                };
                while (maps.len() as i64) < inserted {
                    // Underflow leaves the batch short for the consistency check.
                    let Some(previous) = id.checked_sub(1) else {
                        break;
                    };
                    id = previous;
                    let mut map = GeneratedValues::new();
                    map.insert(
                        column.name().to_string(),
                        Value::Int(id).coerce(column.column_type()),
                    );
                    maps.insert(0, map);
                }
                Ok(())
            }
        }
    }

    fn check_consistency(&self, inserted: i64, maps: &[GeneratedValues]) -> RowbackResult<()> {
        if self.ignore
            || maps.is_empty()
            || self.profile.supports_ternary_affected_row_values
            || maps.len() as i64 == inserted
        {
            return Ok(());
        }

        if self.config.strict_row_count {
            return Err(ReconcileError::RowCountMismatch {
                table: self.schema.name().to_string(),
                expected: inserted as u64,
                got: maps.len(),
            }
            .into());
        }

        self.sink.consistency_warning(&ConsistencyWarning {
            table: self.schema.name().to_string(),
            inserted: inserted as u64,
            generated: maps.len(),
        });
        Ok(())
    }
}

/// Strip identifier quotes and fold case.
fn normalize_label(label: &str) -> String {
    label
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_lowercase()
}

/// Locate a column's field by label: exact first, then case-insensitive.
fn find_field(cursor: &dyn Cursor, column: &str) -> Option<usize> {
    let count = cursor.field_count();
    (0..count)
        .find(|i| cursor.field_label(*i) == Some(column))
        .or_else(|| {
            let wanted = normalize_label(column);
            (0..count).find(|i| {
                cursor
                    .field_label(*i)
                    .map_or(false, |label| normalize_label(label) == wanted)
            })
        })
}

fn fetch_column(cursor: &dyn Cursor, column: &str) -> Result<Value, LookupReason> {
    let index = find_field(cursor, column).ok_or(LookupReason::MissingField)?;
    cursor
        .field(index)
        .map_err(|e| LookupReason::FetchFailed(e.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================
