//! Property-Based Tests for Insert Reconciliation
//!
//! Properties:
//! - Every dialect returns one result row per inserted task, with contiguous ids
//! - Nullable columns left unset materialize as null
//! - A reported identifier wins over the caller's explicit value
//! - Back-filling a last-key-only batch counts down from the reported key
//! - Reconciling identical cursor contents twice gives identical maps

use proptest::prelude::*;
use rowback_core::{DiagnosticsSink, InsertConfig, RecordingSink, Value};
use rowback_insert::{insert, insert_batch, GeneratedValues, InsertContext, Reconciler, RowValues};
use rowback_session::{
    GeneratedKeys, PreparedStatement, ScriptedCursor, ScriptedResponse, ScriptedSession, Session,
};
use rowback_test_utils::fixtures::*;
use rowback_test_utils::generators::*;
use rowback_test_utils::{DialectProfile, TableSchema};

fn task_rows(batch: &[(String, Option<bool>)]) -> Vec<RowValues> {
    batch
        .iter()
        .map(|(title, done)| {
            let row = RowValues::new().with("title", title.as_str());
            match done {
                Some(flag) => row.with("isCompleted", *flag),
                None => row,
            }
        })
        .collect()
}

/// Reconcile a single-row scripted cursor through a fresh session.
fn reconcile_once(
    schema: &TableSchema,
    profile: &DialectProfile,
    sink: &dyn DiagnosticsSink,
    inserted: i64,
    cursor: ScriptedCursor,
) -> Vec<GeneratedValues> {
    let config = InsertConfig::default();
    let mut session =
        ScriptedSession::new().respond(ScriptedResponse::count(inserted).with_keys(cursor));
    let mut stmt: Box<dyn PreparedStatement + '_> = session
        .prepare("INSERT INTO tasks (title) VALUES (?)", &GeneratedKeys::AllColumns)
        .unwrap();
    stmt.execute_update(&[]).unwrap();
    let cursor = stmt.generated_keys().unwrap();
    Reconciler::new(schema, profile, &config, sink)
        .reconcile(inserted, cursor)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_batch_rows_match_inserted_count(
        profile in arb_profile(),
        batch in arb_task_batch(6),
    ) {
        let tasks = tasks_table();
        let mut session = session_for(&profile, &[tasks.clone()]);
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let outcome = insert_batch(&mut session, &ctx, &tasks, task_rows(&batch)).unwrap();

        prop_assert_eq!(outcome.inserted_count, batch.len() as u64);
        prop_assert_eq!(outcome.rows.len(), batch.len());
        for (i, (row, (title, done))) in outcome.rows.iter().zip(&batch).enumerate() {
            prop_assert_eq!(row.get("id").unwrap(), &Value::Int(i as i64 + 1));
            prop_assert_eq!(row.get("title").unwrap(), &Value::from(title.as_str()));
            prop_assert_eq!(row.get("isCompleted").unwrap(), &Value::Bool(done.unwrap_or(false)));
            prop_assert_eq!(row.get_or_null("description"), Some(&Value::Null));
        }
        prop_assert_eq!(session.open_cursors(), 0);
    }

    #[test]
    fn prop_unset_nullable_is_null(profile in arb_profile(), title in arb_title()) {
        let notes = notes_table();
        let mut session = session_for(&profile, &[notes.clone()]);
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let outcome = insert(&mut session, &ctx, &notes, RowValues::new().with("body", title.as_str())).unwrap();
        prop_assert_eq!(outcome.rows[0].get("pinned").unwrap(), &Value::Null);
    }

    #[test]
    fn prop_reported_identifier_wins(explicit in any::<i64>(), reported in any::<i64>()) {
        let tasks = tasks_table();
        let profile = DialectProfile::postgres();
        let mut session = ScriptedSession::new().respond(
            ScriptedResponse::count(1).with_keys(
                ScriptedCursor::new(&["id", "title", "description", "isCompleted"])
                    .row(vec![Value::Int(reported), Value::from("t"), Value::Null, Value::Bool(false)]),
            ),
        );
        let config = InsertConfig::default();
        let sink = RecordingSink::new();
        let ctx = InsertContext::new(&profile, &config, &sink);

        let outcome = insert(
            &mut session,
            &ctx,
            &tasks,
            RowValues::new().with("id", explicit).with("title", "t"),
        )
        .unwrap();
        prop_assert_eq!(outcome.get("id").unwrap(), &Value::Int(reported));
    }

    #[test]
    fn prop_backfill_counts_down(
        profile in arb_last_key_profile(),
        size in 2usize..8,
        last in 8i64..10_000,
    ) {
        let tasks = tasks_table();
        let sink = RecordingSink::new();
        let maps = reconcile_once(
            &tasks,
            &profile,
            &sink,
            size as i64,
            ScriptedCursor::new(&["id"]).row(vec![Value::Int(last)]),
        );

        let ids: Vec<i64> = maps
            .iter()
            .map(|m| m.get("id").and_then(Value::as_i64).unwrap())
            .collect();
        let expected: Vec<i64> = (last - size as i64 + 1..=last).collect();
        prop_assert_eq!(ids, expected);
        prop_assert!(sink.consistency_warnings().is_empty());
    }

    #[test]
    fn prop_reconciliation_is_idempotent(
        profile in arb_profile(),
        id in any::<i64>(),
        title in arb_title(),
        done in any::<bool>(),
        labels in arb_label_case(),
    ) {
        let tasks = tasks_table();
        let names = ["id", "title", "description", "isCompleted"];
        let labels: Vec<String> = names
            .iter()
            .map(|n| match labels {
                rowback_session::LabelCase::AsDeclared => n.to_string(),
                rowback_session::LabelCase::Upper => n.to_uppercase(),
                rowback_session::LabelCase::Lower => n.to_lowercase(),
            })
            .collect();
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let cursor = ScriptedCursor::new(&label_refs).row(vec![
            Value::Int(id),
            Value::from(title.as_str()),
            Value::Null,
            Value::Bool(done),
        ]);

        let first_sink = RecordingSink::new();
        let second_sink = RecordingSink::new();
        let first = reconcile_once(&tasks, &profile, &first_sink, 1, cursor.clone());
        let second = reconcile_once(&tasks, &profile, &second_sink, 1, cursor);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first_sink.events(), second_sink.events());
        prop_assert_eq!(first[0].get("id"), Some(&Value::Int(id)));
    }
}

#[test]
fn reported_identifier_matching_explicit_value() {
    let tasks = tasks_table();
    let profile = DialectProfile::postgres();
    let mut session = ScriptedSession::new().respond(
        ScriptedResponse::count(1).with_keys(
            ScriptedCursor::new(&["id", "title", "description", "isCompleted"])
                .row(vec![Value::Int(42), Value::from("t"), Value::Null, Value::Bool(false)]),
        ),
    );
    let config = InsertConfig::default();
    let sink = RecordingSink::new();
    let ctx = InsertContext::new(&profile, &config, &sink);

    let outcome = insert(
        &mut session,
        &ctx,
        &tasks,
        RowValues::new().with("id", 42).with("title", "t"),
    )
    .unwrap();
    assert_eq!(outcome.get("id").unwrap(), &Value::Int(42));
    assert_eq!(session.calls()[0].params[0][0], Value::Int(42));
    assert!(sink.is_empty());
}
