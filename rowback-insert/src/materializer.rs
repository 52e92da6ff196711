//! Result row materialization.
//!
//! Layers, lowest to highest: null for nullable columns without any
//! default, database-reported values, caller-bound values. Auto-increment
//! and sequence columns keep the database value when one was reported.

use crate::reconciler::GeneratedValues;
use crate::resolver::{ResolvedArg, ResolvedRow};
use rowback_core::{NotFoundError, RowbackResult, TableSchema, Value};
use std::sync::Arc;

/// One inserted row. A slot is absent when nothing is known about the column.
#[derive(Debug, Clone)]
pub struct ResultRow {
    schema: Arc<TableSchema>,
    slots: Vec<Option<Value>>,
}

impl ResultRow {
    pub fn table(&self) -> &str {
        self.schema.name()
    }

    /// Value of a column, or `NotFoundError` when the slot is absent.
    pub fn get(&self, column: &str) -> Result<&Value, NotFoundError> {
        self.get_or_null(column).ok_or_else(|| NotFoundError::Column {
            column: column.to_string(),
        })
    }

    pub fn get_or_null(&self, column: &str) -> Option<&Value> {
        self.schema
            .index_of(column)
            .and_then(|idx| self.slots[idx].as_ref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get_or_null(column).is_some()
    }

    /// Present slots in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .columns()
            .iter()
            .zip(&self.slots)
            .filter_map(|(column, slot)| slot.as_ref().map(|v| (column.name(), v)))
    }
}

impl PartialEq for ResultRow {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.slots == other.slots
    }
}

/// Everything an insert produced.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub inserted_count: u64,
    pub rows: Vec<ResultRow>,
}

impl InsertOutcome {
    /// Value of a column in the first row.
    pub fn get(&self, column: &str) -> RowbackResult<&Value> {
        let row = self.rows.first().ok_or(NotFoundError::NoRows)?;
        Ok(row.get(column)?)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Build the result rows of an insert.
///
/// There is one row per generated-value map when the driver reported any,
/// otherwise one per resolved row.
pub fn materialize(
    schema: &Arc<TableSchema>,
    inserted: i64,
    resolved: &[ResolvedRow],
    generated: &[GeneratedValues],
) -> InsertOutcome {
    let inserted_count = inserted.max(0) as u64;
    if inserted <= 0 {
        return InsertOutcome {
            inserted_count,
            rows: Vec::new(),
        };
    }

    let slot_count = if generated.is_empty() {
        resolved.len()
    } else {
        generated.len()
    };

    let empty = GeneratedValues::new();
    let rows = (0..slot_count)
        .map(|i| build_row(schema, resolved.get(i), generated.get(i).unwrap_or(&empty)))
        .collect();

    InsertOutcome {
        inserted_count,
        rows,
    }
}

fn build_row(
    schema: &Arc<TableSchema>,
    resolved: Option<&ResolvedRow>,
    generated: &GeneratedValues,
) -> ResultRow {
    let columns = schema.columns();
    let mut slots: Vec<Option<Value>> = columns
        .iter()
        .map(|column| (column.is_nullable() && column.has_no_default()).then_some(Value::Null))
        .collect();

    for (name, value) in generated {
        if let Some(idx) = schema.index_of(name) {
            slots[idx] = Some(value.clone());
        }
    }

    if let Some(row) = resolved {
        for (idx, (column, arg)) in columns.iter().zip(row.args()).enumerate() {
            if let ResolvedArg::Bound(value) = arg {
                let keeps_generated =
                    column.is_auto_increment() && generated.contains_key(column.name());
                if !keeps_generated {
                    slots[idx] = Some(value.clone());
                }
            }
        }
    }

    ResultRow {
        schema: Arc::clone(schema),
        slots,
    }
}
