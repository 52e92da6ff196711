//! Rowback Test Utilities
//!
//! Shared test infrastructure for the Rowback workspace:
//! - Proptest generators for values, dialects and batch shapes
//! - Schema and session fixtures (the `tasks` table and friends)
//! - Custom assertions for Rowback error variants
//! - Tracing setup for tests

pub use rowback_core::{
    Column, ColumnType, DialectProfile, InsertConfig, KeyExtrapolation, RecordingSink,
    RowbackError, RowbackResult, TableSchema, Value,
};
pub use rowback_session::{DriverBehavior, InMemorySession, LabelCase, ScriptedSession};

use std::sync::Arc;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
///
/// Honors `RUST_LOG`; defaults to debug output for the Rowback crates.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rowback_insert=debug,rowback_session=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Rowback types.

    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    // === Values ===

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        // 2020-2030
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Any non-null value.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
            "[a-zA-Z0-9 ]{0,24}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
            arb_uuid().prop_map(Value::Uuid),
            arb_timestamp().prop_map(Value::Timestamp),
            any::<i32>().prop_map(|n| Value::Json(serde_json::json!({ "n": n }))),
        ]
    }

    pub fn arb_title() -> impl Strategy<Value = String> {
        "[a-z][a-z ]{0,15}"
    }

    // === Dialects ===

    pub fn arb_profile() -> impl Strategy<Value = DialectProfile> {
        prop_oneof![
            Just(DialectProfile::postgres()),
            Just(DialectProfile::mysql()),
            Just(DialectProfile::mariadb()),
            Just(DialectProfile::sqlite()),
            Just(DialectProfile::h2()),
            Just(DialectProfile::oracle()),
            Just(DialectProfile::sql_server()),
        ]
    }

    /// Dialects whose driver reports only the last generated key of a batch.
    pub fn arb_last_key_profile() -> impl Strategy<Value = DialectProfile> {
        prop_oneof![
            Just(DialectProfile::sqlite()),
            Just(DialectProfile::h2()),
            Just(DialectProfile::sql_server()),
        ]
    }

    pub fn arb_label_case() -> impl Strategy<Value = LabelCase> {
        prop_oneof![
            Just(LabelCase::AsDeclared),
            Just(LabelCase::Upper),
            Just(LabelCase::Lower),
        ]
    }

    // === Batches ===

    /// Task rows as (title, optional completion flag).
    pub fn arb_task_batch(max_rows: usize) -> impl Strategy<Value = Vec<(String, Option<bool>)>> {
        prop::collection::vec((arb_title(), prop::option::of(any::<bool>())), 1..=max_rows)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built schemas, profiles and sessions.

    use super::*;

    /// `tasks(id auto-increment, title, description nullable, isCompleted default false)`
    pub fn tasks_table() -> Arc<TableSchema> {
        TableSchema::builder("tasks")
            .column(Column::new("id", ColumnType::Integer).auto_increment())
            .column(Column::new("title", ColumnType::Varchar(128)))
            .column(Column::new("description", ColumnType::Text).nullable())
            .column(Column::new("isCompleted", ColumnType::Boolean).default(false))
            .build()
            .expect("tasks fixture schema is valid")
    }

    /// Table whose identifier comes from a named sequence.
    pub fn items_table() -> Arc<TableSchema> {
        TableSchema::builder("items")
            .column(Column::new("id", ColumnType::BigInt).sequence("items_id_seq"))
            .column(Column::new("name", ColumnType::Text))
            .build()
            .expect("items fixture schema is valid")
    }

    /// Table with a database-only default and a generated column.
    pub fn audit_table() -> Arc<TableSchema> {
        TableSchema::builder("audit_log")
            .column(Column::new("id", ColumnType::BigInt).auto_increment())
            .column(Column::new("event", ColumnType::Text))
            .column(
                Column::new("recorded_at", ColumnType::Timestamp)
                    .database_default("CURRENT_TIMESTAMP"),
            )
            .column(
                Column::new("status", ColumnType::Text)
                    .database_generated()
                    .database_default("'new'"),
            )
            .build()
            .expect("audit fixture schema is valid")
    }

    /// Table without any generated column.
    pub fn notes_table() -> Arc<TableSchema> {
        TableSchema::builder("notes")
            .column(Column::new("body", ColumnType::Text))
            .column(Column::new("pinned", ColumnType::Boolean).nullable())
            .build()
            .expect("notes fixture schema is valid")
    }

    pub fn all_profiles() -> Vec<DialectProfile> {
        vec![
            DialectProfile::postgres(),
            DialectProfile::mysql(),
            DialectProfile::mariadb(),
            DialectProfile::sqlite(),
            DialectProfile::h2(),
            DialectProfile::oracle(),
            DialectProfile::sql_server(),
        ]
    }

    /// In-memory session behaving like the profile's driver, holding `tables`.
    pub fn session_for(profile: &DialectProfile, tables: &[Arc<TableSchema>]) -> InMemorySession {
        let mut session = InMemorySession::new(DriverBehavior::from_profile(profile));
        for table in tables {
            session.add_table(Arc::clone(table));
        }
        session
    }

    pub fn strict_config() -> InsertConfig {
        InsertConfig {
            strict_row_count: true,
            key_extrapolation: KeyExtrapolation::Refuse,
            ..InsertConfig::default()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Rowback error variants.

    use super::*;
    use rowback_core::{NotFoundError, ReconcileError, SessionError, ValidationError};

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &RowbackResult<T>) -> &ValidationError {
        match result {
            Err(RowbackError::Validation(e)) => e,
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_reconcile_error<T: std::fmt::Debug>(result: &RowbackResult<T>) -> &ReconcileError {
        match result {
            Err(RowbackError::Reconcile(e)) => e,
            other => panic!("Expected Reconcile error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &RowbackResult<T>) -> &NotFoundError {
        match result {
            Err(RowbackError::NotFound(e)) => e,
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert a session failure and return (table, sql, source).
    #[track_caller]
    pub fn assert_session_error<T: std::fmt::Debug>(
        result: &RowbackResult<T>,
    ) -> (&str, &str, &SessionError) {
        match result {
            Err(RowbackError::Session { table, sql, source }) => (table.as_str(), sql.as_str(), source),
            other => panic!("Expected Session error, got: {:?}", other),
        }
    }
}
