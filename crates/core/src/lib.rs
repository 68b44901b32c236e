mod broadcast;
mod config;
mod engine;
mod error;
mod logger;
mod result;
mod runner;
mod transaction;
mod value;

pub use broadcast::{
    AfterQueryEvent, BroadcastOutcome, Broadcaster, Subscriber, TransactionEvent,
};
pub use config::RunnerConfig;
pub use engine::{EngineConnection, EngineTransaction, ScopeDriver, StatementHandle};
pub use error::{BoxError, Error, ExecuteError, Result, TransactionError};
pub use logger::{NoopLogger, QueryLogger, TracingLogger};
pub use result::{QueryResult, RawValue};
pub use runner::QueryRunner;
pub use transaction::{TransactionController, TransactionState};
pub use value::{Row, Value};
