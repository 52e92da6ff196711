//! Rowback Session - Active Session Traits and In-Memory Implementations
//!
//! Defines the session abstraction the insert engine executes against.
//! Real drivers implement [`Session`]; this crate ships two in-memory
//! implementations for tests and examples:
//!
//! - [`InMemorySession`] simulates tables, auto-increment counters, sequences
//!   and database defaults, and reports generated keys the way a configured
//!   driver would.
//! - [`ScriptedSession`] replays canned affected counts and cursors, for
//!   driver quirks that are awkward to simulate.

pub mod memory;
pub mod scripted;

pub use memory::{DriverBehavior, InMemorySession, LabelCase};
pub use scripted::{ScriptedCursor, ScriptedResponse, ScriptedSession, SessionCall};

use rowback_core::{SessionResult, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// GENERATED KEY REQUEST
// ============================================================================

/// Which generated values the statement should make available afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeneratedKeys {
    /// No cursor is wanted.
    #[default]
    None,
    /// Only the named (identifier) columns.
    Columns(Vec<String>),
    /// Every column of the inserted row.
    AllColumns,
}

impl GeneratedKeys {
    pub fn is_requested(&self) -> bool {
        !matches!(self, GeneratedKeys::None)
    }
}

// ============================================================================
// SESSION TRAITS
// ============================================================================

/// An active database session.
///
/// One statement executes at a time; `&mut self` makes that a compile-time
/// guarantee.
pub trait Session {
    /// Prepare an insert statement, declaring up front which generated
    /// values the caller will read back.
    fn prepare<'s>(
        &'s mut self,
        sql: &str,
        keys: &GeneratedKeys,
    ) -> SessionResult<Box<dyn PreparedStatement + 's>>;
}

/// A prepared statement bound to a session.
pub trait PreparedStatement {
    /// Execute once with the given parameters; returns the affected count.
    fn execute_update(&mut self, params: &[Value]) -> SessionResult<i64>;

    /// Queue one parameter set for batch execution.
    fn add_batch(&mut self, params: Vec<Value>) -> SessionResult<()>;

    /// Execute every queued parameter set; one affected count per set.
    fn execute_batch(&mut self) -> SessionResult<Vec<i64>>;

    /// Cursor over the generated values of the last execution, if the
    /// driver has one. Dropping the cursor releases it.
    fn generated_keys(&mut self) -> SessionResult<Option<Box<dyn Cursor + '_>>>;
}

/// Forward-only cursor over generated-value rows.
pub trait Cursor {
    /// Move to the next row; `false` once exhausted.
    fn advance(&mut self) -> SessionResult<bool>;

    fn field_count(&self) -> usize;

    /// Driver-reported label of a field. Some drivers report none.
    fn field_label(&self, index: usize) -> Option<&str>;

    /// Value of a field in the current row.
    fn field(&self, index: usize) -> SessionResult<Value>;
}

/// Counts cursors handed out and released by a session.
#[derive(Debug, Default)]
pub(crate) struct CursorTracker {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl CursorTracker {
    pub(crate) fn acquire(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn open(&self) -> usize {
        self.opened() - self.closed.load(Ordering::SeqCst)
    }
}
