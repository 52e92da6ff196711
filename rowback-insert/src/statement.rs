//! Public insert statements.

use crate::executor::{execute_insert, InsertContext};
use crate::materializer::InsertOutcome;
use crate::resolver::{resolve_rows, ResolvedArguments, ResolvedRow, RowValues};
use rowback_core::{DialectProfile, NotFoundError, RowbackResult, TableSchema, Value};
use rowback_session::Session;
use std::sync::Arc;

// ============================================================================
// SINGLE ROW
// ============================================================================

/// Insert of one row.
///
/// Arguments are resolved on first use and cached, so client-side default
/// generators run at most once per statement.
#[derive(Debug)]
pub struct InsertStatement {
    schema: Arc<TableSchema>,
    values: RowValues,
    ignore: bool,
    arguments: ResolvedArguments,
}

impl InsertStatement {
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            values: RowValues::new(),
            ignore: false,
            arguments: ResolvedArguments::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.set(column, value);
        self.arguments.invalidate();
        self
    }

    /// Replace all row values at once.
    pub fn values(mut self, values: RowValues) -> Self {
        self.values = values;
        self.arguments.invalidate();
        self
    }

    /// Skip rows that conflict with existing ones instead of failing.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn is_ignore(&self) -> bool {
        self.ignore
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// The resolved arguments, computing them on first call.
    pub fn arguments(&self, profile: &DialectProfile) -> RowbackResult<&[ResolvedRow]> {
        self.arguments.get_or_resolve(|| {
            resolve_rows(&self.schema, profile, std::slice::from_ref(&self.values))
        })
    }

    pub fn execute(
        &self,
        session: &mut dyn Session,
        ctx: &InsertContext<'_>,
    ) -> RowbackResult<InsertOutcome> {
        let rows = self.arguments(ctx.profile)?;
        execute_insert(session, &self.schema, rows, self.ignore, ctx)
    }
}

// ============================================================================
// BATCH
// ============================================================================

/// Insert of several rows through one statement text.
#[derive(Debug)]
pub struct BatchInsertStatement {
    schema: Arc<TableSchema>,
    rows: Vec<RowValues>,
    ignore: bool,
    arguments: ResolvedArguments,
}

impl BatchInsertStatement {
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            ignore: false,
            arguments: ResolvedArguments::new(),
        }
    }

    pub fn add_row(mut self, row: RowValues) -> Self {
        self.push_row(row);
        self
    }

    pub fn push_row(&mut self, row: RowValues) {
        self.rows.push(row);
        self.arguments.invalidate();
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn arguments(&self, profile: &DialectProfile) -> RowbackResult<&[ResolvedRow]> {
        self.arguments
            .get_or_resolve(|| resolve_rows(&self.schema, profile, &self.rows))
    }

    pub fn execute(
        &self,
        session: &mut dyn Session,
        ctx: &InsertContext<'_>,
    ) -> RowbackResult<InsertOutcome> {
        let rows = self.arguments(ctx.profile)?;
        execute_insert(session, &self.schema, rows, self.ignore, ctx)
    }
}

// ============================================================================
// CONVENIENCE
// ============================================================================

/// Insert one row.
pub fn insert(
    session: &mut dyn Session,
    ctx: &InsertContext<'_>,
    schema: &Arc<TableSchema>,
    row: RowValues,
) -> RowbackResult<InsertOutcome> {
    InsertStatement::new(Arc::clone(schema))
        .values(row)
        .execute(session, ctx)
}

/// Insert several rows as one batch.
pub fn insert_batch(
    session: &mut dyn Session,
    ctx: &InsertContext<'_>,
    schema: &Arc<TableSchema>,
    rows: Vec<RowValues>,
) -> RowbackResult<InsertOutcome> {
    rows.into_iter()
        .fold(BatchInsertStatement::new(Arc::clone(schema)), |stmt, row| {
            stmt.add_row(row)
        })
        .execute(session, ctx)
}

/// Insert one row and return its auto-increment value.
pub fn insert_and_get_id(
    session: &mut dyn Session,
    ctx: &InsertContext<'_>,
    schema: &Arc<TableSchema>,
    row: RowValues,
) -> RowbackResult<Value> {
    let column = schema
        .single_auto_increment()
        .ok_or_else(|| NotFoundError::NoIdentifier {
            table: schema.name().to_string(),
        })?;
    let outcome = insert(session, ctx, schema, row)?;
    outcome.get(column.name()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowback_core::{Column, ColumnType, InsertConfig, RecordingSink, RowbackError};
    use rowback_session::{DriverBehavior, InMemorySession};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_after_resolution_recomputes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let schema = TableSchema::builder("t")
            .column(Column::new("id", ColumnType::Integer).auto_increment())
            .column(Column::new("token", ColumnType::Text).client_default(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("tok"))
            }))
            .column(Column::new("name", ColumnType::Text).nullable())
            .build()
            .unwrap();
        let profile = DialectProfile::sqlite();

        let stmt = InsertStatement::new(schema);
        stmt.arguments(&profile).unwrap();
        stmt.arguments(&profile).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stmt = stmt.set("name", "x");
        stmt.arguments(&profile).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_insert_and_get_id_requires_identifier() {
        let schema = TableSchema::builder("t")
            .column(Column::new("name", ColumnType::Text))
            .build()
            .unwrap();
        let mut session = InMemorySession::new(DriverBehavior::default()).with_table(schema.clone());
        let profile = DialectProfile::postgres();
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let result = insert_and_get_id(&mut session, &ctx, &schema, RowValues::new().with("name", "a"));
        assert!(matches!(
            result,
            Err(RowbackError::NotFound(NotFoundError::NoIdentifier { .. }))
        ));
        assert!(session.prepared_sql().is_empty());
    }

    #[test]
    fn test_empty_batch_is_rejected_before_session() {
        let schema = TableSchema::builder("t")
            .column(Column::new("id", ColumnType::Integer).auto_increment())
            .build()
            .unwrap();
        let mut session = InMemorySession::new(DriverBehavior::default()).with_table(schema.clone());
        let profile = DialectProfile::postgres();
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let result = insert_batch(&mut session, &ctx, &schema, Vec::new());
        assert!(result.is_err());
        assert!(session.prepared_sql().is_empty());
    }
}
