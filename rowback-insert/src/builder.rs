//! Statement rendering.

use crate::resolver::{ResolvedArg, ResolvedRow};
use rowback_core::{DialectProfile, RowbackResult, TableSchema, ValidationError, Value};

/// Parameterized INSERT text plus the schema columns its placeholders bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedInsert {
    pub sql: String,
    /// Schema column indices, in placeholder order.
    pub bound_columns: Vec<usize>,
}

impl RenderedInsert {
    /// Parameter values of one resolved row, in placeholder order.
    pub fn params(&self, row: &ResolvedRow) -> Vec<Value> {
        self.bound_columns
            .iter()
            .map(|idx| {
                row.get(*idx)
                    .and_then(ResolvedArg::as_bound)
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// Render the INSERT statement for a resolved template row.
///
/// Columns left to the database are omitted. Sequence columns render their
/// next-value expression inline. `returning` names columns for a trailing
/// RETURNING clause on dialects that have one.
pub fn render_insert(
    schema: &TableSchema,
    template: &ResolvedRow,
    profile: &DialectProfile,
    ignore: bool,
    returning: Option<&[String]>,
) -> RowbackResult<RenderedInsert> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut bound_columns = Vec::new();

    for (idx, (column, arg)) in schema.columns().iter().zip(template.args()).enumerate() {
        match arg {
            ResolvedArg::Bound(_) => {
                bound_columns.push(idx);
                columns.push(profile.quote_identifier(column.name()));
                values.push(profile.placeholder(bound_columns.len()));
            }
            ResolvedArg::NextVal(sequence) => {
                // Without a template the column falls back to its database default.
                if let Some(expr) = profile.next_value_expr(sequence) {
                    columns.push(profile.quote_identifier(column.name()));
                    values.push(expr);
                }
            }
            ResolvedArg::DatabaseDefault => {}
        }
    }

    let returning: Option<Vec<String>> = returning.map(|names| {
        names
            .iter()
            .map(|name| profile.quote_identifier(name))
            .collect()
    });

    let sql = profile
        .finish_insert(schema.name(), &columns, &values, ignore, returning.as_deref())
        .ok_or_else(|| ValidationError::IgnoreUnsupported {
            dialect: profile.name.clone(),
        })?;

    Ok(RenderedInsert { sql, bound_columns })
}
