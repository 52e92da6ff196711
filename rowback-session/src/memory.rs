//! In-memory session simulating a small relational backend.
//!
//! The session accepts the INSERT text produced by the statement builder,
//! stores rows per table, assigns auto-increment and sequence values,
//! evaluates literal database defaults and enforces NOT NULL and identifier
//! uniqueness. Generated keys are reported according to a
//! [`DriverBehavior`], so one session can stand in for drivers that return
//! every key or only the last one, upper-case their labels, or fail on a
//! particular field.
//!
//! # Usage
//!
//! ```ignore
//! let mut session = InMemorySession::new(DriverBehavior::from_profile(&DialectProfile::sqlite()))
//!     .with_table(tasks.clone());
//! ```

use crate::{Cursor, CursorTracker, GeneratedKeys, PreparedStatement, Session};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rowback_core::{DialectProfile, SessionError, SessionResult, TableSchema, Value};
use std::collections::HashMap;
use std::sync::Arc;

static INSERT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^INSERT\s+(IGNORE\s+|OR\s+IGNORE\s+)?INTO\s+(\S+)\s*(?:\((.*?)\)\s*VALUES\s*\((.*)\)|DEFAULT\s+VALUES)(\s+ON\s+CONFLICT\s+DO\s+NOTHING)?(\s+RETURNING\s+[^()]*)?$",
    )
    .expect("Invalid insert regex")
});

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("Invalid identifier regex"));

const SEQUENCE_KEYWORDS: &[&str] = &["nextval", "next", "value", "for"];

// ============================================================================
// DRIVER BEHAVIOR
// ============================================================================

/// Letter case a driver applies to generated-key labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelCase {
    #[default]
    AsDeclared,
    Upper,
    Lower,
}

/// How the simulated driver reports generated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverBehavior {
    /// One key row per inserted row; otherwise only the last one.
    pub keys_per_row: bool,
    pub label_case: LabelCase,
    /// Label every generated-key field with this name (e.g. `GENERATED_KEY`).
    pub key_label: Option<String>,
    /// Columns the driver leaves out of the generated-key cursor.
    pub omit_fields: Vec<String>,
    /// Columns whose value the driver fails to read.
    pub failing_fields: Vec<String>,
}

impl Default for DriverBehavior {
    fn default() -> Self {
        Self {
            keys_per_row: true,
            label_case: LabelCase::AsDeclared,
            key_label: None,
            omit_fields: Vec::new(),
            failing_fields: Vec::new(),
        }
    }
}

impl DriverBehavior {
    /// Key reporting matching a dialect's declared capabilities.
    pub fn from_profile(profile: &DialectProfile) -> Self {
        Self {
            keys_per_row: profile.supports_multiple_generated_keys,
            ..Self::default()
        }
    }

    pub fn label_case(mut self, case: LabelCase) -> Self {
        self.label_case = case;
        self
    }

    pub fn key_label(mut self, label: impl Into<String>) -> Self {
        self.key_label = Some(label.into());
        self
    }

    pub fn omit_field(mut self, column: impl Into<String>) -> Self {
        self.omit_fields.push(column.into());
        self
    }

    pub fn failing_field(mut self, column: impl Into<String>) -> Self {
        self.failing_fields.push(column.into());
        self
    }

    fn label(&self, column: &str) -> String {
        if let Some(label) = &self.key_label {
            return label.clone();
        }
        match self.label_case {
            LabelCase::AsDeclared => column.to_string(),
            LabelCase::Upper => column.to_uppercase(),
            LabelCase::Lower => column.to_lowercase(),
        }
    }
}

// ============================================================================
// PARSED STATEMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ValueToken {
    Param(usize),
    NextVal(String),
}

#[derive(Debug, Clone)]
struct ParsedInsert {
    table: String,
    columns: Vec<String>,
    values: Vec<ValueToken>,
    ignore: bool,
}

fn unquote(identifier: &str) -> String {
    let trimmed = identifier.trim();
    for q in ['"', '`'] {
        if trimmed.len() >= 2 && trimmed.starts_with(q) && trimmed.ends_with(q) {
            let inner = &trimmed[1..trimmed.len() - 1];
            return inner.replace(&format!("{}{}", q, q), &q.to_string());
        }
    }
    trimmed.to_string()
}

fn split_list(list: &str) -> Vec<String> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    list.split(", ").map(|s| s.trim().to_string()).collect()
}

fn parse_value_token(token: &str, next_question: &mut usize) -> SessionResult<ValueToken> {
    if token == "?" {
        let position = *next_question;
        *next_question += 1;
        return Ok(ValueToken::Param(position));
    }
    if let Some(n) = token.strip_prefix('$') {
        let n: usize = n.parse().map_err(|_| SessionError::Prepare {
            reason: format!("bad placeholder {}", token),
        })?;
        if n == 0 {
            return Err(SessionError::Prepare {
                reason: "placeholders are 1-based".to_string(),
            });
        }
        return Ok(ValueToken::Param(n - 1));
    }
    IDENT_RE
        .find_iter(token)
        .map(|m| m.as_str())
        .find(|word| !SEQUENCE_KEYWORDS.contains(&word.to_lowercase().as_str()))
        .map(|sequence| ValueToken::NextVal(sequence.to_string()))
        .ok_or_else(|| SessionError::Prepare {
            reason: format!("unsupported value expression {}", token),
        })
}

fn parse_insert(sql: &str) -> SessionResult<ParsedInsert> {
    let captures = INSERT_RE.captures(sql.trim()).ok_or_else(|| SessionError::Prepare {
        reason: format!("not an insert statement: {}", sql),
    })?;

    let ignore = captures.get(1).is_some() || captures.get(5).is_some();
    let table = unquote(&captures[2]);
    let columns: Vec<String> = captures
        .get(3)
        .map(|m| split_list(m.as_str()).iter().map(|c| unquote(c)).collect())
        .unwrap_or_default();

    let mut next_question = 0;
    let values = captures
        .get(4)
        .map(|m| split_list(m.as_str()))
        .unwrap_or_default()
        .iter()
        .map(|token| parse_value_token(token, &mut next_question))
        .collect::<SessionResult<Vec<_>>>()?;

    if columns.len() != values.len() {
        return Err(SessionError::Prepare {
            reason: format!(
                "{} columns but {} values in {}",
                columns.len(),
                values.len(),
                sql
            ),
        });
    }

    Ok(ParsedInsert {
        table,
        columns,
        values,
        ignore,
    })
}

/// Evaluate a literal database default expression.
fn eval_default(expression: &str) -> Value {
    let expr = expression.trim();
    match expr.to_uppercase().as_str() {
        "NULL" => return Value::Null,
        "TRUE" => return Value::Bool(true),
        "FALSE" => return Value::Bool(false),
        "CURRENT_TIMESTAMP" | "NOW()" => return Value::Timestamp(Utc::now()),
        _ => {}
    }
    if let Ok(i) = expr.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(x) = expr.parse::<f64>() {
        return Value::Float(x);
    }
    if expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\'') {
        return Value::Text(expr[1..expr.len() - 1].replace("''", "'"));
    }
    Value::Text(expr.to_string())
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug)]
struct MemTable {
    schema: Arc<TableSchema>,
    rows: Vec<Vec<Value>>,
    counters: HashMap<String, i64>,
}

/// Session backed by in-memory tables.
#[derive(Debug)]
pub struct InMemorySession {
    behavior: DriverBehavior,
    tables: HashMap<String, MemTable>,
    sequences: HashMap<String, i64>,
    prepared: Vec<String>,
    cursors: Arc<CursorTracker>,
    closed: bool,
}

impl InMemorySession {
    pub fn new(behavior: DriverBehavior) -> Self {
        Self {
            behavior,
            tables: HashMap::new(),
            sequences: HashMap::new(),
            prepared: Vec::new(),
            cursors: Arc::new(CursorTracker::default()),
            closed: false,
        }
    }

    pub fn with_table(mut self, schema: Arc<TableSchema>) -> Self {
        self.add_table(schema);
        self
    }

    pub fn add_table(&mut self, schema: Arc<TableSchema>) {
        self.tables.insert(
            schema.name().to_string(),
            MemTable {
                schema,
                rows: Vec::new(),
                counters: HashMap::new(),
            },
        );
    }

    /// Stored rows of a table, in schema column order.
    pub fn rows(&self, table: &str) -> Option<&[Vec<Value>]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    /// Every statement text prepared on this session, in order.
    pub fn prepared_sql(&self) -> &[String] {
        &self.prepared
    }

    /// Consume auto-increment values as another writer would.
    pub fn advance_auto_increment(&mut self, table: &str, column: &str, by: i64) {
        if let Some(t) = self.tables.get_mut(table) {
            *t.counters.entry(column.to_string()).or_insert(0) += by;
        }
    }

    pub fn cursors_opened(&self) -> usize {
        self.cursors.opened()
    }

    /// Cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.cursors.open()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Session for InMemorySession {
    fn prepare<'s>(
        &'s mut self,
        sql: &str,
        keys: &GeneratedKeys,
    ) -> SessionResult<Box<dyn PreparedStatement + 's>> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let parsed = parse_insert(sql)?;
        if !self.tables.contains_key(&parsed.table) {
            return Err(SessionError::Prepare {
                reason: format!("relation {} does not exist", parsed.table),
            });
        }
        self.prepared.push(sql.to_string());
        tracing::debug!(sql = %sql, "in-memory session prepared statement");

        Ok(Box::new(MemStatement {
            session: self,
            parsed,
            keys: keys.clone(),
            batch: Vec::new(),
            last_inserted: Vec::new(),
        }))
    }
}

// ============================================================================
// STATEMENT
// ============================================================================

struct MemStatement<'s> {
    session: &'s mut InMemorySession,
    parsed: ParsedInsert,
    keys: GeneratedKeys,
    batch: Vec<Vec<Value>>,
    last_inserted: Vec<Vec<Value>>,
}

impl MemStatement<'_> {
    /// Insert one row; `None` when an ignore-mode conflict skipped it.
    fn insert_row(&mut self, params: &[Value]) -> SessionResult<Option<Vec<Value>>> {
        let InMemorySession {
            tables, sequences, ..
        } = &mut *self.session;
        let table = tables
            .get_mut(&self.parsed.table)
            .ok_or_else(|| SessionError::Execute {
                reason: format!("relation {} does not exist", self.parsed.table),
            })?;
        let schema = table.schema.clone();
        let columns = schema.columns();

        let mut row = vec![Value::Null; columns.len()];
        let mut provided = vec![false; columns.len()];

        for (name, token) in self.parsed.columns.iter().zip(&self.parsed.values) {
            let idx = schema.index_of(name).ok_or_else(|| SessionError::Execute {
                reason: format!("column {} of relation {} does not exist", name, schema.name()),
            })?;
            if columns[idx].is_database_generated() {
                return Err(SessionError::Execute {
                    reason: format!("cannot insert a non-DEFAULT value into column {}", name),
                });
            }
            row[idx] = match token {
                ValueToken::Param(i) => params.get(*i).cloned().ok_or_else(|| {
                    SessionError::Execute {
                        reason: format!("no value bound for parameter {}", i + 1),
                    }
                })?,
                ValueToken::NextVal(sequence) => {
                    let next = sequences.entry(sequence.clone()).or_insert(0);
                    *next += 1;
                    Value::Int(*next)
                }
            };
            provided[idx] = true;
        }

        for (idx, column) in columns.iter().enumerate() {
            if provided[idx] {
                if column.is_auto_increment() {
                    if let Some(explicit) = row[idx].as_i64() {
                        let counter = table.counters.entry(column.name().to_string()).or_insert(0);
                        *counter = (*counter).max(explicit);
                    }
                }
                continue;
            }
            row[idx] = if column.is_auto_increment() {
                let counter = table.counters.entry(column.name().to_string()).or_insert(0);
                *counter += 1;
                Value::Int(*counter)
            } else if let Some(expression) = column.database_default_expr() {
                eval_default(expression).coerce(column.column_type())
            } else {
                Value::Null
            };
        }

        for (idx, column) in columns.iter().enumerate() {
            if !column.is_nullable() && row[idx].is_null() {
                return Err(SessionError::ConstraintViolation {
                    constraint: format!("{}_{}_not_null", schema.name(), column.name()),
                    reason: format!("null value in column {}", column.name()),
                });
            }
        }

        for (idx, column) in columns.iter().enumerate() {
            if !column.is_auto_increment() {
                continue;
            }
            if table.rows.iter().any(|existing| existing[idx] == row[idx]) {
                if self.parsed.ignore {
                    return Ok(None);
                }
                return Err(SessionError::ConstraintViolation {
                    constraint: format!("{}_pkey", schema.name()),
                    reason: format!("duplicate key {} = {}", column.name(), row[idx]),
                });
            }
        }

        table.rows.push(row.clone());
        Ok(Some(row))
    }
}

impl PreparedStatement for MemStatement<'_> {
    fn execute_update(&mut self, params: &[Value]) -> SessionResult<i64> {
        self.last_inserted.clear();
        match self.insert_row(params)? {
            Some(row) => {
                self.last_inserted.push(row);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn add_batch(&mut self, params: Vec<Value>) -> SessionResult<()> {
        self.batch.push(params);
        Ok(())
    }

    fn execute_batch(&mut self) -> SessionResult<Vec<i64>> {
        self.last_inserted.clear();
        let batch = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(batch.len());
        for params in &batch {
            match self.insert_row(params)? {
                Some(row) => {
                    self.last_inserted.push(row);
                    counts.push(1);
                }
                None => counts.push(0),
            }
        }
        Ok(counts)
    }

    fn generated_keys(&mut self) -> SessionResult<Option<Box<dyn Cursor + '_>>> {
        let schema = match self.session.tables.get(&self.parsed.table) {
            Some(table) => table.schema.clone(),
            None => return Ok(None),
        };
        let behavior = &self.session.behavior;

        let requested: Vec<usize> = match &self.keys {
            GeneratedKeys::None => return Ok(None),
            GeneratedKeys::AllColumns => (0..schema.columns().len()).collect(),
            GeneratedKeys::Columns(names) => {
                names.iter().filter_map(|name| schema.index_of(name)).collect()
            }
        };
        let fields: Vec<usize> = requested
            .into_iter()
            .filter(|idx| {
                let name = schema.columns()[*idx].name();
                !behavior.omit_fields.iter().any(|omitted| omitted == name)
            })
            .collect();

        let labels = fields
            .iter()
            .map(|idx| behavior.label(schema.columns()[*idx].name()))
            .collect();
        let failing = fields
            .iter()
            .map(|idx| {
                let name = schema.columns()[*idx].name();
                behavior.failing_fields.iter().any(|f| f == name)
            })
            .collect();

        let source: Vec<&Vec<Value>> = if behavior.keys_per_row {
            self.last_inserted.iter().collect()
        } else {
            self.last_inserted.last().into_iter().collect()
        };
        let rows = source
            .into_iter()
            .map(|row| fields.iter().map(|idx| row[*idx].clone()).collect())
            .collect();

        self.session.cursors.acquire();
        Ok(Some(Box::new(MemCursor {
            labels,
            rows,
            failing,
            position: None,
            tracker: Arc::clone(&self.session.cursors),
        })))
    }
}

// ============================================================================
// CURSOR
// ============================================================================

struct MemCursor {
    labels: Vec<String>,
    rows: Vec<Vec<Value>>,
    failing: Vec<bool>,
    position: Option<usize>,
    tracker: Arc<CursorTracker>,
}

impl Cursor for MemCursor {
    fn advance(&mut self) -> SessionResult<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn field_count(&self) -> usize {
        self.labels.len()
    }

    fn field_label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    fn field(&self, index: usize) -> SessionResult<Value> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| SessionError::Cursor {
                reason: "cursor is not positioned on a row".to_string(),
            })?;
        if self.failing.get(index).copied().unwrap_or(false) {
            return Err(SessionError::Cursor {
                reason: format!("driver failed to read field {}", index + 1),
            });
        }
        row.get(index).cloned().ok_or_else(|| SessionError::Cursor {
            reason: format!("field index {} out of range", index + 1),
        })
    }
}

impl Drop for MemCursor {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

// ============================================================================
// TESTS
// ============================================================================
