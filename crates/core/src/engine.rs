use crate::{BoxError, Row, Value};

/// One physical connection to the storage engine.
///
/// The engine executes statements only inside its own exclusive transaction
/// scope: `open_exclusive_scope` serializes the scope, auto-commits when the
/// driver's work returns `Ok`, and rolls back when it returns `Err`. Exactly
/// one of work-resolution or `on_failure` fires per invocation, always
/// followed by `on_complete`.
pub trait EngineConnection {
    fn open_exclusive_scope(&mut self, driver: &mut dyn ScopeDriver);

    /// Runs a statement directly against the connection, outside any
    /// transaction scope. Used for pragma traffic by migration tooling.
    fn execute_direct(&mut self, sql: &str) -> std::result::Result<(), BoxError>;
}

/// Callback trio handed to [`EngineConnection::open_exclusive_scope`].
pub trait ScopeDriver {
    /// Runs inside the exclusive scope with the scope's live transaction
    /// handle. Returning `Err` makes the engine roll the scope back and
    /// deliver the error to [`ScopeDriver::on_failure`].
    fn work(&mut self, tx: &mut dyn EngineTransaction) -> std::result::Result<(), BoxError>;

    /// The scope failed, either because `work` returned `Err` or because the
    /// engine itself could not open or close the scope.
    fn on_failure(&mut self, error: BoxError);

    /// The scope closed, success or failure. Always fires last.
    fn on_complete(&mut self);
}

/// The engine's live transaction handle, valid only inside the work callback.
pub trait EngineTransaction {
    /// Primary execution path: compile the statement into a handle that can
    /// fetch its rows and report change metadata.
    fn prepare<'a>(
        &'a mut self,
        sql: &str,
        parameters: &[Value],
    ) -> std::result::Result<Box<dyn StatementHandle + 'a>, BoxError>;

    /// Fallback path for statements that do not yield a fetchable handle
    /// (pragmas, some DDL): fetch all rows directly from the scope.
    fn fetch_all(
        &mut self,
        sql: &str,
        parameters: &[Value],
    ) -> std::result::Result<Vec<Row>, BoxError>;
}

/// Engine-returned handle for one compiled statement.
pub trait StatementHandle {
    fn fetch_rows(&mut self) -> std::result::Result<Vec<Row>, BoxError>;

    /// Affected-row count, when the statement kind exposes one.
    fn changes(&self) -> Option<u64>;

    /// Identifier of the last inserted row, when the statement kind exposes one.
    fn last_insert_row_id(&self) -> Option<i64>;
}
