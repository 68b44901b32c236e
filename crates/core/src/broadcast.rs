use std::time::Duration;

use crate::{BoxError, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    BeforeStart,
    AfterStart,
    BeforeCommit,
    AfterCommit,
    BeforeRollback,
    AfterRollback,
}

impl TransactionEvent {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TransactionEvent::BeforeStart => "before-transaction-start",
            TransactionEvent::AfterStart => "after-transaction-start",
            TransactionEvent::BeforeCommit => "before-transaction-commit",
            TransactionEvent::AfterCommit => "after-transaction-commit",
            TransactionEvent::BeforeRollback => "before-transaction-rollback",
            TransactionEvent::AfterRollback => "after-transaction-rollback",
        }
    }
}

/// Payload of the after-query broadcast. Rows are present only on success,
/// the error only on failure.
#[derive(Debug)]
pub struct AfterQueryEvent<'a> {
    pub sql: &'a str,
    pub parameters: &'a [Value],
    pub success: bool,
    pub elapsed: Option<Duration>,
    pub rows: Option<&'a [Row]>,
    pub error: Option<&'a (dyn std::error::Error + 'a)>,
}

/// A registered lifecycle listener. Hooks default to no-ops so subscribers
/// implement only what they observe.
pub trait Subscriber {
    fn transaction_event(&self, event: TransactionEvent) -> std::result::Result<(), BoxError> {
        let _ = event;
        Ok(())
    }

    fn before_query(
        &self,
        sql: &str,
        parameters: &[Value],
    ) -> std::result::Result<(), BoxError> {
        let _ = (sql, parameters);
        Ok(())
    }

    fn after_query(&self, event: &AfterQueryEvent<'_>) -> std::result::Result<(), BoxError> {
        let _ = event;
        Ok(())
    }
}

/// Append-only record of subscriber results for one broadcast. [`wait`]
/// is the join point: it consumes the outcome and surfaces the first
/// subscriber failure once every subscriber has finished.
///
/// [`wait`]: BroadcastOutcome::wait
#[derive(Debug, Default)]
pub struct BroadcastOutcome {
    notified: usize,
    failures: Vec<BoxError>,
}

impl BroadcastOutcome {
    pub fn record(&mut self, result: std::result::Result<(), BoxError>) {
        self.notified += 1;
        if let Err(error) = result {
            self.failures.push(error);
        }
    }

    #[must_use]
    pub fn notified(&self) -> usize {
        self.notified
    }

    pub fn wait(self) -> std::result::Result<(), BoxError> {
        match self.failures.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Synchronous dispatcher over the registered subscriber list. Subscribers
/// are notified in registration order; every broadcast returns an outcome
/// the caller awaits before finalizing the triggering operation.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    #[must_use]
    pub fn broadcast(&self, event: TransactionEvent) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for subscriber in &self.subscribers {
            outcome.record(subscriber.transaction_event(event));
        }
        outcome
    }

    #[must_use]
    pub fn broadcast_before_query(&self, sql: &str, parameters: &[Value]) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for subscriber in &self.subscribers {
            outcome.record(subscriber.before_query(sql, parameters));
        }
        outcome
    }

    #[must_use]
    pub fn broadcast_after_query(&self, event: &AfterQueryEvent<'_>) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for subscriber in &self.subscribers {
            outcome.record(subscriber.after_query(event));
        }
        outcome
    }
}
