use std::time::Duration;

use crate::Value;

/// Sink for query, slow-query, and error logging.
pub trait QueryLogger {
    fn log_query(&self, sql: &str, parameters: &[Value]);
    fn log_query_slow(&self, elapsed: Duration, sql: &str, parameters: &[Value]);
    fn log_query_error(&self, error: &dyn std::error::Error, sql: &str, parameters: &[Value]);
}

/// Logger sink emitting `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log_query(&self, sql: &str, parameters: &[Value]) {
        tracing::debug!(sql, ?parameters, "executing query");
    }

    fn log_query_slow(&self, elapsed: Duration, sql: &str, parameters: &[Value]) {
        tracing::warn!(?elapsed, sql, ?parameters, "slow query");
    }

    fn log_query_error(&self, error: &dyn std::error::Error, sql: &str, parameters: &[Value]) {
        tracing::error!(%error, sql, ?parameters, "query failed");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl QueryLogger for NoopLogger {
    fn log_query(&self, _sql: &str, _parameters: &[Value]) {}

    fn log_query_slow(&self, _elapsed: Duration, _sql: &str, _parameters: &[Value]) {}

    fn log_query_error(&self, _error: &dyn std::error::Error, _sql: &str, _parameters: &[Value]) {}
}
