use crate::{Broadcaster, Result, TransactionError, TransactionEvent};

/// Caller-facing logical transaction state, layered over the engine's single
/// implicit scope. The handle slot records possession of the scope's live
/// transaction handle; the borrow itself never outlives the work callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionState {
    active: bool,
    depth: u32,
    scope_handle: bool,
}

impl TransactionState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn has_scope_handle(&self) -> bool {
        self.scope_handle
    }
}

/// Owns the logical transaction bookkeeping.
///
/// The engine allows exactly one physical transaction scope and decides its
/// outcome from whether the scope's work callback resolves or rejects, so
/// start/commit/rollback cannot map onto BEGIN/COMMIT/ROLLBACK statements.
/// They track intent and depth; the Query Executor drives the actual
/// resolve/reject that determines durability.
#[derive(Debug, Default)]
pub struct TransactionController {
    state: TransactionState,
}

impl TransactionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Starting while already active is tolerated: depth simply increments.
    pub fn start(&mut self, broadcaster: &Broadcaster) -> Result<()> {
        if let Err(source) = broadcaster.broadcast(TransactionEvent::BeforeStart).wait() {
            self.state.active = false;
            return Err(broadcast_error(TransactionEvent::BeforeStart, source));
        }

        self.state.active = true;
        self.state.depth += 1;

        broadcaster
            .broadcast(TransactionEvent::AfterStart)
            .wait()
            .map_err(|source| broadcast_error(TransactionEvent::AfterStart, source))?;
        Ok(())
    }

    /// Clears adapter-side bookkeeping; never issues a COMMIT statement.
    /// Durability happens when the engine's scope callback resolves.
    pub fn commit(&mut self, broadcaster: &Broadcaster) -> Result<()> {
        self.finish(
            broadcaster,
            TransactionEvent::BeforeCommit,
            TransactionEvent::AfterCommit,
        )
    }

    /// Bookkeeping twin of [`commit`]; never issues a ROLLBACK statement.
    /// Physical rollback is achieved by the Executor rejecting the scope.
    ///
    /// [`commit`]: TransactionController::commit
    pub fn rollback(&mut self, broadcaster: &Broadcaster) -> Result<()> {
        self.finish(
            broadcaster,
            TransactionEvent::BeforeRollback,
            TransactionEvent::AfterRollback,
        )
    }

    /// Records that the Executor attached the scope's live handle.
    pub fn attach_scope_handle(&mut self) {
        self.state.scope_handle = true;
    }

    /// Authoritative reset on scope completion, success or failure.
    pub fn reset(&mut self) {
        self.state = TransactionState::default();
    }

    fn finish(
        &mut self,
        broadcaster: &Broadcaster,
        before: TransactionEvent,
        after: TransactionEvent,
    ) -> Result<()> {
        if !self.state.active && !self.state.scope_handle {
            return Err(TransactionError::NotStarted.into());
        }

        broadcaster
            .broadcast(before)
            .wait()
            .map_err(|source| broadcast_error(before, source))?;

        self.state.scope_handle = false;
        self.state.active = false;
        self.state.depth = self.state.depth.saturating_sub(1);

        broadcaster
            .broadcast(after)
            .wait()
            .map_err(|source| broadcast_error(after, source))?;
        Ok(())
    }
}

fn broadcast_error(event: TransactionEvent, source: crate::BoxError) -> crate::Error {
    TransactionError::Broadcast {
        event: event.name(),
        source,
    }
    .into()
}
