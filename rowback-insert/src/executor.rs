//! Statement execution against an active session.

use crate::builder::render_insert;
use crate::materializer::{materialize, InsertOutcome};
use crate::reconciler::Reconciler;
use crate::resolver::ResolvedRow;
use rowback_core::{
    DiagnosticsSink, DialectProfile, InsertConfig, RowbackError, RowbackResult, SessionError,
    TableSchema, ValidationError,
};
use rowback_session::{GeneratedKeys, Session};
use std::sync::Arc;

/// Dialect, configuration and diagnostics for one insert call.
#[derive(Clone, Copy)]
pub struct InsertContext<'a> {
    pub profile: &'a DialectProfile,
    pub config: &'a InsertConfig,
    pub sink: &'a dyn DiagnosticsSink,
}

impl<'a> InsertContext<'a> {
    pub fn new(
        profile: &'a DialectProfile,
        config: &'a InsertConfig,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            profile,
            config,
            sink,
        }
    }
}

/// Decide which generated values to ask the driver for.
///
/// Nothing is requested unless the table has an auto-increment or
/// database-generated column, or the dialect cannot narrow the listing to
/// identifiers. Database-generated columns count as identifiers.
pub fn key_request(
    schema: &TableSchema,
    profile: &DialectProfile,
    config: &InsertConfig,
) -> GeneratedKeys {
    if !config.return_generated_values {
        return GeneratedKeys::None;
    }

    let identifiers: Vec<String> = schema
        .identifier_columns()
        .map(|c| c.name().to_string())
        .collect();

    match (
        identifiers.is_empty(),
        profile.supports_only_identifiers_in_generated_keys,
    ) {
        (true, true) => GeneratedKeys::None,
        (false, true) => GeneratedKeys::Columns(identifiers),
        (_, false) => GeneratedKeys::AllColumns,
    }
}

/// Columns for a RETURNING clause, on dialects that take one.
pub fn returning_columns(
    schema: &TableSchema,
    profile: &DialectProfile,
    keys: &GeneratedKeys,
) -> Option<Vec<String>> {
    if !profile.supports_returning {
        return None;
    }
    match keys {
        GeneratedKeys::None => None,
        GeneratedKeys::Columns(names) => Some(names.clone()),
        GeneratedKeys::AllColumns => Some(
            schema
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        ),
    }
}

/// Render, execute and reconcile an insert of already-resolved rows.
pub fn execute_insert(
    session: &mut dyn Session,
    schema: &Arc<TableSchema>,
    rows: &[ResolvedRow],
    ignore: bool,
    ctx: &InsertContext<'_>,
) -> RowbackResult<InsertOutcome> {
    let Some(template) = rows.first() else {
        return Err(ValidationError::EmptyInsert {
            table: schema.name().to_string(),
        }
        .into());
    };

    let keys = key_request(schema, ctx.profile, ctx.config);
    let returning = returning_columns(schema, ctx.profile, &keys);
    let rendered = render_insert(schema, template, ctx.profile, ignore, returning.as_deref())?;

    let table = schema.name();
    let sql = rendered.sql.as_str();
    let on_session = |e: SessionError| RowbackError::session(table, sql, e);

    let batched = rows.len() > 1 || ctx.config.always_batch;
    let (inserted, maps) = {
        let mut stmt = session.prepare(sql, &keys).map_err(on_session)?;

        let inserted: i64 = if batched {
            for row in rows {
                stmt.add_batch(rendered.params(row)).map_err(on_session)?;
            }
            stmt.execute_batch().map_err(on_session)?.into_iter().sum()
        } else {
            stmt.execute_update(&rendered.params(template))
                .map_err(on_session)?
        };

        tracing::debug!(
            table = %table,
            sql = %sql,
            rows = rows.len(),
            batched,
            inserted,
            keys = ?keys,
            "Executed insert"
        );

        let cursor = if keys.is_requested() {
            stmt.generated_keys().map_err(on_session)?
        } else {
            None
        };

        let maps = Reconciler::new(schema, ctx.profile, ctx.config, ctx.sink)
            .ignore(ignore)
            .statement(sql)
            .reconcile(inserted, cursor)?;
        (inserted, maps)
    };

    Ok(materialize(schema, inserted, rows, &maps))
}
