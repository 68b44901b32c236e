use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use monoql_core::{
    AfterQueryEvent, BoxError, EngineConnection, EngineTransaction, QueryLogger, Row, ScopeDriver,
    StatementHandle, Subscriber, TransactionEvent, Value,
};

/// Shared ordered journal so engine, subscriber, and logger activity can be
/// asserted against one timeline.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

#[allow(dead_code)]
impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|item| item == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|item| *item == entry).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedStatement {
    pub rows: Vec<Row>,
    pub changes: Option<u64>,
    pub last_insert_row_id: Option<i64>,
    /// Primary path (prepare) errors, forcing the fallback fetch.
    pub fail_prepare: Option<String>,
    /// Fallback path errors too, failing the statement outright.
    pub fail_fetch_all: Option<String>,
}

#[derive(Default)]
struct FakeEngineState {
    scripts: HashMap<String, ScriptedStatement>,
    fail_scope_open: Option<String>,
    scopes_opened: usize,
    committed: usize,
    rolled_back: usize,
    direct_sql: Vec<String>,
}

/// Scripted engine connection in front of no real storage. Scope outcome
/// follows the contract: work-Ok commits, work-Err rolls back and routes the
/// error to `on_failure`, `on_complete` always fires last.
pub struct FakeEngine {
    state: Rc<RefCell<FakeEngineState>>,
    journal: Journal,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new(journal: Journal) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeEngineState::default())),
            journal,
        }
    }

    pub fn script(&self, sql: impl Into<String>, statement: ScriptedStatement) {
        self.state
            .borrow_mut()
            .scripts
            .insert(sql.into(), statement);
    }

    pub fn set_fail_scope_open(&self, message: impl Into<String>) {
        self.state.borrow_mut().fail_scope_open = Some(message.into());
    }

    pub fn scopes_opened(&self) -> usize {
        self.state.borrow().scopes_opened
    }

    pub fn committed(&self) -> usize {
        self.state.borrow().committed
    }

    pub fn rolled_back(&self) -> usize {
        self.state.borrow().rolled_back
    }

    pub fn direct_sql(&self) -> Vec<String> {
        self.state.borrow().direct_sql.clone()
    }

    /// Handle pair for observing the engine after the runner takes ownership.
    pub fn split(self) -> (Box<Self>, FakeEngineProbe) {
        let probe = FakeEngineProbe {
            state: Rc::clone(&self.state),
        };
        (Box::new(self), probe)
    }
}

pub struct FakeEngineProbe {
    state: Rc<RefCell<FakeEngineState>>,
}

#[allow(dead_code)]
impl FakeEngineProbe {
    pub fn scopes_opened(&self) -> usize {
        self.state.borrow().scopes_opened
    }

    pub fn committed(&self) -> usize {
        self.state.borrow().committed
    }

    pub fn rolled_back(&self) -> usize {
        self.state.borrow().rolled_back
    }

    pub fn direct_sql(&self) -> Vec<String> {
        self.state.borrow().direct_sql.clone()
    }
}

impl EngineConnection for FakeEngine {
    fn open_exclusive_scope(&mut self, driver: &mut dyn ScopeDriver) {
        let scripted_failure = {
            let mut state = self.state.borrow_mut();
            state.scopes_opened += 1;
            state.fail_scope_open.clone()
        };
        self.journal.push("engine:scope-opened");

        if let Some(message) = scripted_failure {
            driver.on_failure(fake_error(message));
            driver.on_complete();
            return;
        }

        let mut scope = FakeScope {
            state: Rc::clone(&self.state),
            journal: self.journal.clone(),
        };
        match driver.work(&mut scope) {
            Ok(()) => {
                self.state.borrow_mut().committed += 1;
                self.journal.push("engine:committed");
            }
            Err(error) => {
                self.state.borrow_mut().rolled_back += 1;
                self.journal.push("engine:rolled-back");
                driver.on_failure(error);
            }
        }
        driver.on_complete();
    }

    fn execute_direct(&mut self, sql: &str) -> std::result::Result<(), BoxError> {
        self.state.borrow_mut().direct_sql.push(sql.to_string());
        self.journal.push(format!("engine:direct:{sql}"));
        Ok(())
    }
}

struct FakeScope {
    state: Rc<RefCell<FakeEngineState>>,
    journal: Journal,
}

impl FakeScope {
    fn script_for(&self, sql: &str) -> ScriptedStatement {
        self.state
            .borrow()
            .scripts
            .get(sql)
            .cloned()
            .unwrap_or_default()
    }
}

impl EngineTransaction for FakeScope {
    fn prepare<'a>(
        &'a mut self,
        sql: &str,
        _parameters: &[Value],
    ) -> std::result::Result<Box<dyn StatementHandle + 'a>, BoxError> {
        let script = self.script_for(sql);
        if let Some(message) = script.fail_prepare {
            self.journal.push(format!("engine:prepare-failed:{sql}"));
            return Err(fake_error(message));
        }
        self.journal.push(format!("engine:prepare:{sql}"));
        Ok(Box::new(FakeStatement { script }))
    }

    fn fetch_all(
        &mut self,
        sql: &str,
        _parameters: &[Value],
    ) -> std::result::Result<Vec<Row>, BoxError> {
        let script = self.script_for(sql);
        if let Some(message) = script.fail_fetch_all {
            self.journal.push(format!("engine:fetch-all-failed:{sql}"));
            return Err(fake_error(message));
        }
        self.journal.push(format!("engine:fetch-all:{sql}"));
        Ok(script.rows)
    }
}

struct FakeStatement {
    script: ScriptedStatement,
}

impl StatementHandle for FakeStatement {
    fn fetch_rows(&mut self) -> std::result::Result<Vec<Row>, BoxError> {
        Ok(self.script.rows.clone())
    }

    fn changes(&self) -> Option<u64> {
        self.script.changes
    }

    fn last_insert_row_id(&self) -> Option<i64> {
        self.script.last_insert_row_id
    }
}

/// Journaling subscriber with an optional scripted failure on one event name.
pub struct RecordingSubscriber {
    journal: Journal,
    fail_on: Option<&'static str>,
}

#[allow(dead_code)]
impl RecordingSubscriber {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_on: None,
        }
    }

    pub fn failing_on(journal: Journal, event: &'static str) -> Self {
        Self {
            journal,
            fail_on: Some(event),
        }
    }

    fn dispatch(&self, entry: String, event: &str) -> std::result::Result<(), BoxError> {
        self.journal.push(entry);
        match self.fail_on {
            Some(fail_on) if fail_on == event => Err(fake_error(format!("subscriber rejected {event}"))),
            _ => Ok(()),
        }
    }
}

impl Subscriber for RecordingSubscriber {
    fn transaction_event(&self, event: TransactionEvent) -> std::result::Result<(), BoxError> {
        self.dispatch(event.name().to_string(), event.name())
    }

    fn before_query(&self, sql: &str, _parameters: &[Value]) -> std::result::Result<(), BoxError> {
        self.dispatch(format!("before-query:{sql}"), "before-query")
    }

    fn after_query(&self, event: &AfterQueryEvent<'_>) -> std::result::Result<(), BoxError> {
        let outcome = if event.success { "success" } else { "failure" };
        self.dispatch(format!("after-query:{outcome}:{}", event.sql), "after-query")
    }
}

#[derive(Default)]
struct LoggerState {
    queries: Vec<(String, Vec<Value>)>,
    slow: Vec<(Duration, String)>,
    errors: Vec<(String, String)>,
}

/// Journaling logger sink.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    state: Rc<RefCell<LoggerState>>,
}

#[allow(dead_code)]
impl RecordingLogger {
    pub fn queries(&self) -> Vec<(String, Vec<Value>)> {
        self.state.borrow().queries.clone()
    }

    pub fn slow(&self) -> Vec<(Duration, String)> {
        self.state.borrow().slow.clone()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.state.borrow().errors.clone()
    }
}

impl QueryLogger for RecordingLogger {
    fn log_query(&self, sql: &str, parameters: &[Value]) {
        self.state
            .borrow_mut()
            .queries
            .push((sql.to_string(), parameters.to_vec()));
    }

    fn log_query_slow(&self, elapsed: Duration, sql: &str, _parameters: &[Value]) {
        self.state.borrow_mut().slow.push((elapsed, sql.to_string()));
    }

    fn log_query_error(&self, error: &dyn std::error::Error, sql: &str, _parameters: &[Value]) {
        self.state
            .borrow_mut()
            .errors
            .push((error.to_string(), sql.to_string()));
    }
}

#[derive(Debug)]
struct FakeEngineError(String);

impl fmt::Display for FakeEngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FakeEngineError {}

pub fn fake_error(message: impl Into<String>) -> BoxError {
    Box::new(FakeEngineError(message.into()))
}
