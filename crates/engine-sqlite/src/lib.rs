use std::path::Path;

use monoql_core::{
    BoxError, EngineConnection, EngineTransaction, Row, ScopeDriver, StatementHandle, Value,
};
use rusqlite::{Connection, Statement, TransactionBehavior};

mod convert;

use convert::{from_sqlite, to_sqlite};

/// One physical SQLite connection behind the engine contract.
///
/// Each exclusive scope is a `BEGIN EXCLUSIVE` transaction: committed when
/// the driver's work resolves, rolled back when it rejects. Mutual exclusion
/// of the scope is inherent in `&mut self` — a second scope cannot open
/// before the first one has returned.
pub struct SqliteEngine {
    connection: Connection,
}

impl SqliteEngine {
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        Ok(Self {
            connection: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self {
            connection: Connection::open_in_memory()?,
        })
    }
}

impl EngineConnection for SqliteEngine {
    fn open_exclusive_scope(&mut self, driver: &mut dyn ScopeDriver) {
        if let Err(error) = run_scope(&mut self.connection, driver) {
            driver.on_failure(error);
        }
        driver.on_complete();
    }

    fn execute_direct(&mut self, sql: &str) -> std::result::Result<(), BoxError> {
        self.connection.execute_batch(sql).map_err(boxed)
    }
}

fn run_scope(
    connection: &mut Connection,
    driver: &mut dyn ScopeDriver,
) -> std::result::Result<(), BoxError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Exclusive)
        .map_err(boxed)?;

    let mut scope = SqliteScope { connection: &*tx };
    match driver.work(&mut scope) {
        Ok(()) => tx.commit().map_err(boxed),
        Err(error) => {
            // Explicit rollback failures are unreachable in practice; the
            // transaction also rolls back on drop.
            let _ = tx.rollback();
            Err(error)
        }
    }
}

struct SqliteScope<'c> {
    connection: &'c Connection,
}

impl EngineTransaction for SqliteScope<'_> {
    fn prepare<'a>(
        &'a mut self,
        sql: &str,
        parameters: &[Value],
    ) -> std::result::Result<Box<dyn StatementHandle + 'a>, BoxError> {
        let statement = self.connection.prepare(sql).map_err(boxed)?;
        Ok(Box::new(SqliteStatement {
            connection: self.connection,
            statement,
            parameters: parameters.to_vec(),
            changes: None,
            last_insert_row_id: None,
        }))
    }

    fn fetch_all(
        &mut self,
        sql: &str,
        parameters: &[Value],
    ) -> std::result::Result<Vec<Row>, BoxError> {
        let mut statement = self.connection.prepare(sql).map_err(boxed)?;
        collect_rows(&mut statement, parameters)
    }
}

struct SqliteStatement<'c> {
    connection: &'c Connection,
    statement: Statement<'c>,
    parameters: Vec<Value>,
    changes: Option<u64>,
    last_insert_row_id: Option<i64>,
}

impl StatementHandle for SqliteStatement<'_> {
    fn fetch_rows(&mut self) -> std::result::Result<Vec<Row>, BoxError> {
        let rows = collect_rows(&mut self.statement, &self.parameters)?;
        // Change metadata is valid only once the statement has stepped.
        self.changes = Some(self.connection.changes());
        self.last_insert_row_id = Some(self.connection.last_insert_rowid());
        Ok(rows)
    }

    fn changes(&self) -> Option<u64> {
        self.changes
    }

    fn last_insert_row_id(&self) -> Option<i64> {
        self.last_insert_row_id
    }
}

fn collect_rows(
    statement: &mut Statement<'_>,
    parameters: &[Value],
) -> std::result::Result<Vec<Row>, BoxError> {
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    for (index, value) in parameters.iter().enumerate() {
        statement
            .raw_bind_parameter(index + 1, to_sqlite(value))
            .map_err(boxed)?;
    }

    let mut rows = statement.raw_query();
    let mut fetched = Vec::new();
    while let Some(row) = rows.next().map_err(boxed)? {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(from_sqlite(row.get_ref(index).map_err(boxed)?));
        }
        fetched.push(Row::new(columns.clone(), values));
    }

    Ok(fetched)
}

fn boxed(error: rusqlite::Error) -> BoxError {
    Box::new(error)
}
