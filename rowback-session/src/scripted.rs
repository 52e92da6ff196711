//! Scripted session replaying canned results.
//!
//! Each execution pops the next [`ScriptedResponse`]. Every prepared
//! statement is recorded as a [`SessionCall`] so tests can assert on the
//! SQL text, the generated-key request and the bound parameters.

use crate::{Cursor, CursorTracker, GeneratedKeys, PreparedStatement, Session};
use rowback_core::{SessionError, SessionResult, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Canned generated-value cursor.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCursor {
    labels: Vec<Option<String>>,
    rows: Vec<Vec<Value>>,
    failing: Vec<usize>,
}

impl ScriptedCursor {
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| Some(l.to_string())).collect(),
            ..Self::default()
        }
    }

    /// Cursor whose driver reports no field labels.
    pub fn unlabeled(field_count: usize) -> Self {
        Self {
            labels: vec![None; field_count],
            ..Self::default()
        }
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// Reading this field index fails on every row.
    pub fn failing_field(mut self, index: usize) -> Self {
        self.failing.push(index);
        self
    }
}

/// Result of one scripted execution.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    counts: Vec<i64>,
    keys: Option<ScriptedCursor>,
    error: Option<SessionError>,
}

impl ScriptedResponse {
    pub fn count(affected: i64) -> Self {
        Self::counts(vec![affected])
    }

    /// One affected count per batch entry.
    pub fn counts(counts: Vec<i64>) -> Self {
        Self {
            counts,
            ..Self::default()
        }
    }

    pub fn error(error: SessionError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_keys(mut self, cursor: ScriptedCursor) -> Self {
        self.keys = Some(cursor);
        self
    }
}

/// A statement prepared on a [`ScriptedSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCall {
    pub sql: String,
    pub keys: GeneratedKeys,
    /// One parameter set per execution or batch entry.
    pub params: Vec<Vec<Value>>,
    pub batched: bool,
}

/// Session that replays queued responses.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    responses: VecDeque<ScriptedResponse>,
    calls: Vec<SessionCall>,
    cursors: Arc<CursorTracker>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, response: ScriptedResponse) -> Self {
        self.responses.push_back(response);
        self
    }

    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    pub fn cursors_opened(&self) -> usize {
        self.cursors.opened()
    }

    pub fn open_cursors(&self) -> usize {
        self.cursors.open()
    }

    /// Responses not consumed yet.
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl Session for ScriptedSession {
    fn prepare<'s>(
        &'s mut self,
        sql: &str,
        keys: &GeneratedKeys,
    ) -> SessionResult<Box<dyn PreparedStatement + 's>> {
        self.calls.push(SessionCall {
            sql: sql.to_string(),
            keys: keys.clone(),
            params: Vec::new(),
            batched: false,
        });
        let call = self.calls.len() - 1;
        Ok(Box::new(ScriptedStatement {
            session: self,
            call,
            queued: Vec::new(),
            keys: None,
        }))
    }
}

struct ScriptedStatement<'s> {
    session: &'s mut ScriptedSession,
    call: usize,
    queued: Vec<Vec<Value>>,
    keys: Option<ScriptedCursor>,
}

impl ScriptedStatement<'_> {
    fn next_response(&mut self) -> SessionResult<ScriptedResponse> {
        let response = self
            .session
            .responses
            .pop_front()
            .ok_or_else(|| SessionError::Execute {
                reason: "no scripted response left".to_string(),
            })?;
        if let Some(error) = response.error {
            return Err(error);
        }
        Ok(response)
    }
}

impl PreparedStatement for ScriptedStatement<'_> {
    fn execute_update(&mut self, params: &[Value]) -> SessionResult<i64> {
        self.session.calls[self.call].params.push(params.to_vec());
        let response = self.next_response()?;
        self.keys = response.keys;
        Ok(response.counts.first().copied().unwrap_or(0))
    }

    fn add_batch(&mut self, params: Vec<Value>) -> SessionResult<()> {
        self.queued.push(params);
        Ok(())
    }

    fn execute_batch(&mut self) -> SessionResult<Vec<i64>> {
        let queued = std::mem::take(&mut self.queued);
        let call = &mut self.session.calls[self.call];
        call.batched = true;
        call.params.extend(queued);
        let response = self.next_response()?;
        self.keys = response.keys;
        Ok(response.counts)
    }

    fn generated_keys(&mut self) -> SessionResult<Option<Box<dyn Cursor + '_>>> {
        let Some(script) = self.keys.take() else {
            return Ok(None);
        };
        self.session.cursors.acquire();
        Ok(Some(Box::new(ReplayCursor {
            script,
            position: None,
            tracker: Arc::clone(&self.session.cursors),
        })))
    }
}

struct ReplayCursor {
    script: ScriptedCursor,
    position: Option<usize>,
    tracker: Arc<CursorTracker>,
}

impl Cursor for ReplayCursor {
    fn advance(&mut self) -> SessionResult<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.script.rows.len()));
        Ok(next < self.script.rows.len())
    }

    fn field_count(&self) -> usize {
        self.script.labels.len()
    }

    fn field_label(&self, index: usize) -> Option<&str> {
        self.script.labels.get(index).and_then(|l| l.as_deref())
    }

    fn field(&self, index: usize) -> SessionResult<Value> {
        if self.script.failing.contains(&index) {
            return Err(SessionError::Cursor {
                reason: format!("scripted failure reading field {}", index + 1),
            });
        }
        self.position
            .and_then(|p| self.script.rows.get(p))
            .and_then(|row| row.get(index))
            .cloned()
            .ok_or_else(|| SessionError::Cursor {
                reason: format!("no value at field {}", index + 1),
            })
    }
}

impl Drop for ReplayCursor {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
