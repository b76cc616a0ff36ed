use tablekit_sdk::{
    context::{ExecutionContext, TransactionHandle},
    emit::{Emit, EmittedEvent},
    error::DomainError,
    event::PublishedEvent,
};
use tracing::{debug, warn};

use crate::deps::Ports;

/// One transactional unit of a command.
///
/// When the incoming context already carries a transaction the scope joins
/// it: nothing is committed here and collected events are left on the shared
/// handle for the owning scope to publish. Otherwise the scope opens its own
/// transaction and [`UnitOfWorkScope::complete`] commits or rolls it back.
///
/// Events reach the event bus only after a successful commit.
pub struct UnitOfWorkScope<'a> {
    ports: &'a Ports,
    ctx: ExecutionContext,
    owned: Option<TransactionHandle>,
}

impl<'a> UnitOfWorkScope<'a> {
    pub async fn begin(ports: &'a Ports, ctx: &ExecutionContext) -> Result<Self, DomainError> {
        if ctx.transaction().is_some() {
            return Ok(UnitOfWorkScope {
                ports,
                ctx: ctx.clone(),
                owned: None,
            });
        }

        let transaction = ports.unit_of_work.begin(ctx).await?;
        debug!(transaction_id = %transaction.id(), "began transaction");
        Ok(UnitOfWorkScope {
            ports,
            ctx: ctx.with_transaction(transaction.clone()),
            owned: Some(transaction),
        })
    }

    /// Context bound to this scope's transaction.
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn is_nested(&self) -> bool {
        self.owned.is_none()
    }

    /// Queues events for publication after commit.
    pub fn collect(&self, events: Emit) {
        if let Some(transaction) = self.ctx.transaction() {
            transaction.defer_events(events);
        }
    }

    /// Collects the events of a successful outcome, then completes the scope.
    ///
    /// Returns the value together with the events it produced.
    pub async fn complete_with_events<T>(
        self,
        result: Result<(T, Emit), DomainError>,
    ) -> Result<(T, Vec<EmittedEvent>), DomainError> {
        let result = result.map(|(value, events)| {
            let emitted = events.events().to_vec();
            self.collect(events);
            (value, emitted)
        });
        self.complete(result).await
    }

    /// Ends the scope with the outcome of its work.
    ///
    /// On success an owned transaction is committed and every queued event is
    /// published. On failure it is rolled back, queued events are dropped and
    /// the original error is returned unchanged.
    pub async fn complete<T>(self, result: Result<T, DomainError>) -> Result<T, DomainError> {
        let Some(transaction) = self.owned else {
            return result;
        };

        match result {
            Ok(value) => {
                self.ports.unit_of_work.commit(&transaction).await?;
                debug!(transaction_id = %transaction.id(), "committed transaction");

                let events: Vec<PublishedEvent> = transaction
                    .take_deferred()
                    .into_iter()
                    .map(|event| event.into_published(self.ctx.envelope()))
                    .collect();
                if !events.is_empty() {
                    debug!(count = events.len(), "publishing events");
                    self.ports.event_bus.publish_many(events).await?;
                }
                Ok(value)
            }
            Err(err) => {
                transaction.take_deferred();
                if let Err(rollback_err) = self.ports.unit_of_work.rollback(&transaction).await {
                    warn!(
                        transaction_id = %transaction.id(),
                        "rollback failed: {rollback_err}"
                    );
                }
                debug!(transaction_id = %transaction.id(), "rolled back transaction");
                Err(err)
            }
        }
    }
}
