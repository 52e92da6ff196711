//! End-to-end insert scenarios against the in-memory and scripted sessions.

use rowback_core::{Column, ColumnType, InsertConfig, LookupReason, RecordingSink, TableSchema, Value};
use rowback_insert::{insert, insert_batch, BatchInsertStatement, InsertContext, RowValues};
use rowback_session::{
    DriverBehavior, GeneratedKeys, InMemorySession, ScriptedCursor, ScriptedResponse,
    ScriptedSession,
};
use rowback_test_utils::fixtures::*;
use rowback_test_utils::{init_tracing, DialectProfile};
use std::sync::Arc;

fn ids(outcome: &rowback_insert::InsertOutcome) -> Vec<Value> {
    outcome
        .rows
        .iter()
        .map(|row| row.get("id").cloned().unwrap_or(Value::Null))
        .collect()
}

// ============================================================================
// TWO ROWS, ONE DEFAULTED FLAG
// ============================================================================

#[test]
fn two_tasks_get_defaults_and_consecutive_ids_on_every_dialect() {
    init_tracing();
    let tasks = tasks_table();

    for profile in all_profiles() {
        let mut session = session_for(&profile, &[tasks.clone()]);
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let outcome = insert_batch(
            &mut session,
            &ctx,
            &tasks,
            vec![
                RowValues::new()
                    .with("title", "write docs")
                    .with("description", "for the reconciler"),
                RowValues::new()
                    .with("title", "ship it")
                    .with("description", "tag a release")
                    .with("isCompleted", true),
            ],
        )
        .unwrap();

        assert_eq!(outcome.inserted_count, 2, "{}", profile.name);
        assert_eq!(outcome.rows.len(), 2, "{}", profile.name);
        assert_eq!(outcome.rows[0].get("isCompleted").unwrap(), &Value::Bool(false));
        assert_eq!(outcome.rows[1].get("isCompleted").unwrap(), &Value::Bool(true));
        assert_eq!(ids(&outcome), vec![Value::Int(1), Value::Int(2)], "{}", profile.name);
        assert!(sink.is_empty(), "{}: {:?}", profile.name, sink.events());
        assert_eq!(session.open_cursors(), 0);
    }
}

// ============================================================================
// LAST-KEY-ONLY DRIVER
// ============================================================================

#[test]
fn batch_on_last_key_driver_is_back_filled() {
    let tasks = tasks_table();
    let profile = DialectProfile::sqlite();
    let mut session = session_for(&profile, &[tasks.clone()]);
    // Another writer consumed ids 1..=7.
    session.advance_auto_increment("tasks", "id", 7);

    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = BatchInsertStatement::new(tasks.clone())
        .add_row(RowValues::new().with("title", "a"))
        .add_row(RowValues::new().with("title", "b"))
        .add_row(RowValues::new().with("title", "c"))
        .execute(&mut session, &ctx)
        .unwrap();

    assert_eq!(ids(&outcome), vec![Value::Int(8), Value::Int(9), Value::Int(10)]);
    assert_eq!(outcome.rows[0].get("title").unwrap(), &Value::from("a"));
    assert_eq!(outcome.rows[2].get("title").unwrap(), &Value::from("c"));
    assert!(sink.is_empty());
}

#[test]
fn batch_with_scripted_last_key() {
    let tasks = tasks_table();
    let profile = DialectProfile::h2();
    let mut session = ScriptedSession::new().respond(
        ScriptedResponse::counts(vec![1, 1, 1])
            .with_keys(ScriptedCursor::new(&["ID"]).row(vec![Value::Int(10)])),
    );
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert_batch(
        &mut session,
        &ctx,
        &tasks,
        ["a", "b", "c"]
            .iter()
            .map(|t| RowValues::new().with("title", *t))
            .collect(),
    )
    .unwrap();

    assert_eq!(ids(&outcome), vec![Value::Int(8), Value::Int(9), Value::Int(10)]);
    let call = &session.calls()[0];
    assert!(call.batched);
    assert_eq!(call.keys, GeneratedKeys::AllColumns);
    assert_eq!(call.params.len(), 3);
    assert_eq!(session.open_cursors(), 0);
}

// ============================================================================
// FULL-ROW DIALECT, ONLY THE ID REPORTED
// ============================================================================

#[test]
fn full_row_dialect_reporting_only_id_keeps_caller_values() {
    let tasks = tasks_table();
    let profile = DialectProfile::h2();
    let mut session = ScriptedSession::new().respond(
        ScriptedResponse::count(1).with_keys(ScriptedCursor::new(&["ID"]).row(vec![Value::Int(1)])),
    );
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(
        &mut session,
        &ctx,
        &tasks,
        RowValues::new().with("title", "only one"),
    )
    .unwrap();

    let row = &outcome.rows[0];
    assert_eq!(row.get("id").unwrap(), &Value::Int(1));
    assert_eq!(row.get("title").unwrap(), &Value::from("only one"));
    assert_eq!(row.get("isCompleted").unwrap(), &Value::Bool(false));
    assert_eq!(row.get_or_null("description"), Some(&Value::Null));

    let failures = sink.lookup_failures();
    let missing: Vec<&str> = failures.iter().map(|f| f.column.as_str()).collect();
    assert_eq!(missing, vec!["title", "description", "isCompleted"]);
    assert!(failures.iter().all(|f| f.reason == LookupReason::MissingField));
    assert_eq!(session.open_cursors(), 0);
}

// ============================================================================
// OTHER SHAPES
// ============================================================================

#[test]
fn sequence_backed_identifier() {
    let items = items_table();
    for profile in [DialectProfile::postgres(), DialectProfile::oracle(), DialectProfile::sqlite()] {
        let mut session = session_for(&profile, &[items.clone()]);
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let outcome = insert(&mut session, &ctx, &items, RowValues::new().with("name", "bolt")).unwrap();
        assert_eq!(outcome.get("id").unwrap(), &Value::Int(1), "{}", profile.name);

        let inline = profile.sequence_next_value.is_some();
        assert_eq!(
            session.prepared_sql()[0].contains("items_id_seq"),
            inline,
            "{}",
            profile.name
        );
    }
}

#[test]
fn database_defaults_come_back_on_full_row_dialects() {
    let audit = audit_table();
    let profile = DialectProfile::postgres();
    let mut session = session_for(&profile, &[audit.clone()]);
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(&mut session, &ctx, &audit, RowValues::new().with("event", "login")).unwrap();
    let row = &outcome.rows[0];
    assert_eq!(row.get("status").unwrap(), &Value::from("new"));
    assert!(matches!(row.get("recorded_at").unwrap(), Value::Timestamp(_)));
    assert!(session.prepared_sql()[0].contains("RETURNING"));
}

#[test]
fn identifier_only_dialect_returns_generated_but_not_defaulted_columns() {
    let audit = audit_table();
    let profile = DialectProfile::mysql();
    let mut session = session_for(&profile, &[audit.clone()]);
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(&mut session, &ctx, &audit, RowValues::new().with("event", "login")).unwrap();
    let row = &outcome.rows[0];
    assert_eq!(row.get("id").unwrap(), &Value::Int(1));
    assert_eq!(row.get("status").unwrap(), &Value::from("new"));
    assert!(!row.contains("recorded_at"));
    assert!(sink.is_empty());
}

// ============================================================================
// DATABASE-GENERATED COLUMNS
// ============================================================================

/// `orders(name, total generated by the database as 7)`, optionally keyed.
fn orders_table(with_id: bool) -> Arc<TableSchema> {
    let builder = TableSchema::builder("orders");
    let builder = if with_id {
        builder.column(Column::new("id", ColumnType::Integer).auto_increment())
    } else {
        builder
    };
    builder
        .column(Column::new("name", ColumnType::Text))
        .column(
            Column::new("total", ColumnType::Integer)
                .database_generated()
                .database_default("7"),
        )
        .build()
        .unwrap()
}

#[test]
fn database_generated_value_comes_back_on_every_dialect() {
    for with_id in [false, true] {
        let orders = orders_table(with_id);
        for profile in all_profiles() {
            let mut session = session_for(&profile, &[orders.clone()]);
            let config = InsertConfig::default();
            let sink = RecordingSink::new();
            let ctx = InsertContext::new(&profile, &config, &sink);

            let outcome = insert(&mut session, &ctx, &orders, RowValues::new().with("name", "crate"))
                .unwrap();
            let row = &outcome.rows[0];
            assert_eq!(
                row.get_or_null("total"),
                Some(&Value::Int(7)),
                "{} with_id={}",
                profile.name,
                with_id
            );
            if with_id {
                assert_eq!(row.get("id").unwrap(), &Value::Int(1), "{}", profile.name);
            }
            assert_eq!(session.cursors_opened(), 1, "{}", profile.name);
            assert_eq!(session.open_cursors(), 0);
        }
    }
}

#[test]
fn identifier_only_dialect_requests_generated_columns_by_name() {
    let orders = orders_table(true);
    let profile = DialectProfile::mysql();
    let mut session = ScriptedSession::new().respond(
        ScriptedResponse::count(1).with_keys(
            ScriptedCursor::new(&["id", "total"]).row(vec![Value::Int(41), Value::Int(7)]),
        ),
    );
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(&mut session, &ctx, &orders, RowValues::new().with("name", "crate")).unwrap();
    assert_eq!(
        session.calls()[0].keys,
        GeneratedKeys::Columns(vec!["id".to_string(), "total".to_string()])
    );
    assert_eq!(outcome.get("id").unwrap(), &Value::Int(41));
    assert_eq!(outcome.get("total").unwrap(), &Value::Int(7));
    assert!(sink.is_empty());
}

#[test]
fn table_without_generated_columns_skips_the_cursor() {
    let notes = notes_table();
    let profile = DialectProfile::sqlite();
    let mut session = session_for(&profile, &[notes.clone()]);
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(&mut session, &ctx, &notes, RowValues::new().with("body", "hi")).unwrap();
    assert_eq!(outcome.inserted_count, 1);
    assert_eq!(outcome.get("body").unwrap(), &Value::from("hi"));
    assert_eq!(outcome.rows[0].get_or_null("pinned"), Some(&Value::Null));
    assert_eq!(session.cursors_opened(), 0);
}

#[test]
fn upper_case_driver_labels_still_match() {
    let tasks = tasks_table();
    let profile = DialectProfile::h2();
    let mut session = InMemorySession::new(
        DriverBehavior::from_profile(&profile).label_case(rowback_session::LabelCase::Upper),
    )
    .with_table(tasks.clone());
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(&mut session, &ctx, &tasks, RowValues::new().with("title", "caps")).unwrap();
    assert_eq!(outcome.get("id").unwrap(), &Value::Int(1));
    assert!(sink.is_empty());
}
