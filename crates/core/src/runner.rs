use std::io;
use std::time::Instant;

use crate::{
    AfterQueryEvent, BoxError, BroadcastOutcome, Broadcaster, EngineConnection, EngineTransaction,
    Error, ExecuteError, QueryLogger, QueryResult, RawValue, Result, Row, RunnerConfig,
    ScopeDriver, Subscriber, TransactionController, TransactionState, Value,
};

/// Textual override marker; deliberately case-sensitive and unparsed.
const INSERT_PREFIX: &str = "INSERT INTO";

/// Single-connection query executor.
///
/// Every statement runs inside the engine's exclusive scope. A logical
/// transaction is started lazily on the first statement when the caller has
/// not started one; commit and rollback adjust bookkeeping only, while the
/// physical outcome is decided by whether the scope's work resolves or
/// rejects.
pub struct QueryRunner {
    engine: Box<dyn EngineConnection>,
    broadcaster: Broadcaster,
    logger: Box<dyn QueryLogger>,
    controller: TransactionController,
    config: RunnerConfig,
    released: bool,
}

impl QueryRunner {
    #[must_use]
    pub fn new(engine: Box<dyn EngineConnection>) -> Self {
        Self {
            engine,
            broadcaster: Broadcaster::new(),
            logger: Box::new(crate::TracingLogger),
            controller: TransactionController::new(),
            config: RunnerConfig::default(),
            released: false,
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Box<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.broadcaster.subscribe(subscriber);
    }

    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.controller.state()
    }

    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.controller.is_active()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn start_transaction(&mut self) -> Result<()> {
        self.ensure_not_released()?;
        self.controller.start(&self.broadcaster)
    }

    pub fn commit_transaction(&mut self) -> Result<()> {
        self.ensure_not_released()?;
        self.controller.commit(&self.broadcaster)
    }

    pub fn rollback_transaction(&mut self) -> Result<()> {
        self.ensure_not_released()?;
        self.controller.rollback(&self.broadcaster)
    }

    /// Executes a statement and returns the raw result shape: the fetched
    /// rows, or the inserted row identifier for `INSERT INTO` statements.
    pub fn query(&mut self, sql: &str, parameters: &[Value]) -> Result<RawValue> {
        self.run(sql, parameters).map(QueryResult::into_raw)
    }

    /// Executes a statement and returns the full structured result.
    pub fn query_structured(&mut self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.run(sql, parameters)
    }

    /// Toggles referential-integrity enforcement directly on the connection,
    /// bypassing the transaction machinery. Migration tooling hook.
    pub fn set_foreign_keys(&mut self, enabled: bool) -> Result<()> {
        self.ensure_not_released()?;
        let sql = if enabled {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        self.engine
            .execute_direct(sql)
            .map_err(|source| query_failed(sql, &[], source))
    }

    /// Tears the runner down. Every later operation fails with
    /// [`ExecuteError::Released`]. Idempotent.
    pub fn release(&mut self) {
        self.released = true;
    }

    fn ensure_not_released(&self) -> Result<()> {
        if self.released {
            return Err(ExecuteError::Released.into());
        }
        Ok(())
    }

    fn run(&mut self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.ensure_not_released()?;

        let before_outcome = self.broadcaster.broadcast_before_query(sql, parameters);
        let started = Instant::now();

        let Self {
            engine,
            broadcaster,
            logger,
            controller,
            config,
            ..
        } = self;

        let mut driver = StatementDriver {
            controller,
            broadcaster,
            logger: logger.as_ref(),
            config: *config,
            sql,
            parameters,
            started,
            before_outcome: Some(before_outcome),
            settlement: None,
        };
        engine.open_exclusive_scope(&mut driver);

        // The before-query outcome is normally awaited inside the work
        // callback; when the scope failed before work ran it is still
        // pending here.
        if let Some(before) = driver.before_outcome.take() {
            let _ = before.wait();
        }

        driver.settlement.take().unwrap_or_else(|| {
            Err(ExecuteError::ScopeFailed(Box::new(io::Error::other(
                "engine scope closed without settling the operation",
            )))
            .into())
        })
    }
}

/// Per-statement round trip through the engine's exclusive scope. Exactly one
/// settlement is recorded across the work/failure callbacks; completion only
/// resets transaction bookkeeping.
struct StatementDriver<'a> {
    controller: &'a mut TransactionController,
    broadcaster: &'a Broadcaster,
    logger: &'a dyn QueryLogger,
    config: RunnerConfig,
    sql: &'a str,
    parameters: &'a [Value],
    started: Instant,
    before_outcome: Option<BroadcastOutcome>,
    settlement: Option<Result<QueryResult>>,
}

impl ScopeDriver for StatementDriver<'_> {
    fn work(&mut self, tx: &mut dyn EngineTransaction) -> std::result::Result<(), BoxError> {
        match self.run_statement(tx) {
            Ok(result) => {
                self.settlement = Some(Ok(result));
                Ok(())
            }
            Err(source) => {
                self.logger
                    .log_query_error(source.as_ref(), self.sql, self.parameters);

                let event = AfterQueryEvent {
                    sql: self.sql,
                    parameters: self.parameters,
                    success: false,
                    elapsed: None,
                    rows: None,
                    error: Some(source.as_ref()),
                };
                let after = self.broadcaster.broadcast_after_query(&event);
                if let Some(before) = self.before_outcome.take() {
                    let _ = before.wait();
                }
                let _ = after.wait();

                self.settlement = Some(Err(query_failed(self.sql, self.parameters, source)));
                Err(Box::new(StatementAborted))
            }
        }
    }

    fn on_failure(&mut self, error: BoxError) {
        // Bookkeeping rollback; the scope's error is what surfaces, and the
        // state is reset on completion regardless.
        if self.controller.state().is_active() || self.controller.state().has_scope_handle() {
            let _ = self.controller.rollback(self.broadcaster);
        }
        // A statement-level failure keeps its QueryFailed settlement; any
        // other state (none, or a success the engine could not commit)
        // becomes a scope failure.
        if !matches!(self.settlement, Some(Err(_))) {
            self.settlement = Some(Err(ExecuteError::ScopeFailed(error).into()));
        }
    }

    fn on_complete(&mut self) {
        self.controller.reset();
    }
}

impl StatementDriver<'_> {
    fn run_statement(
        &mut self,
        tx: &mut dyn EngineTransaction,
    ) -> std::result::Result<QueryResult, BoxError> {
        if !self.controller.is_active() {
            self.controller
                .start(self.broadcaster)
                .map_err(|error| -> BoxError { Box::new(error) })?;
            self.controller.attach_scope_handle();
        }

        self.logger.log_query(self.sql, self.parameters);

        // Primary path: statement handle, then fetch through it. Statement
        // kinds without a fetchable handle (pragma, some DDL) error here and
        // fall back to fetching directly from the scope transaction.
        let (rows, changes, last_insert_id) = match execute_primary(tx, self.sql, self.parameters)
        {
            Ok(outcome) => outcome,
            Err(_) => (tx.fetch_all(self.sql, self.parameters)?, None, None),
        };

        let elapsed = self.started.elapsed();
        if let Some(threshold) = self.config.slow_query_threshold
            && elapsed > threshold
        {
            self.logger.log_query_slow(elapsed, self.sql, self.parameters);
        }

        let event = AfterQueryEvent {
            sql: self.sql,
            parameters: self.parameters,
            success: true,
            elapsed: Some(elapsed),
            rows: Some(&rows),
            error: None,
        };
        let after = self.broadcaster.broadcast_after_query(&event);
        if let Some(before) = self.before_outcome.take() {
            before.wait()?;
        }
        after.wait()?;

        Ok(shape_result(self.sql, rows, changes, last_insert_id))
    }
}

fn execute_primary(
    tx: &mut dyn EngineTransaction,
    sql: &str,
    parameters: &[Value],
) -> std::result::Result<(Vec<Row>, Option<u64>, Option<i64>), BoxError> {
    let mut handle = tx.prepare(sql, parameters)?;
    let rows = handle.fetch_rows()?;
    Ok((rows, handle.changes(), handle.last_insert_row_id()))
}

fn shape_result(
    sql: &str,
    rows: Vec<Row>,
    changes: Option<u64>,
    last_insert_id: Option<i64>,
) -> QueryResult {
    let raw = match last_insert_id {
        Some(id) if sql.starts_with(INSERT_PREFIX) => RawValue::InsertId(id),
        _ => RawValue::Rows(rows.clone()),
    };
    QueryResult::new(changes, Some(raw), Some(rows))
}

fn query_failed(sql: &str, parameters: &[Value], source: BoxError) -> Error {
    ExecuteError::QueryFailed {
        sql: sql.to_string(),
        parameters: parameters.to_vec(),
        source,
    }
    .into()
}

#[derive(Debug, thiserror::Error)]
#[error("statement failed inside the exclusive scope")]
struct StatementAborted;
