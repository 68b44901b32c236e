use thiserror::Error;

use crate::Value;

/// Opaque cause reported by an external collaborator (engine, subscriber).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction is not started yet; call start_transaction before commit or rollback")]
    NotStarted,

    #[error("subscriber failed during `{event}` broadcast")]
    Broadcast {
        event: &'static str,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("query runner has already been released")]
    Released,

    #[error("query failed: `{sql}` -- parameters: {parameters:?}")]
    QueryFailed {
        sql: String,
        parameters: Vec<Value>,
        #[source]
        source: BoxError,
    },

    #[error("engine transaction scope failed")]
    ScopeFailed(#[source] BoxError),
}

/// Top-level error wrapping the stage-typed errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

pub type Result<T> = std::result::Result<T, Error>;
