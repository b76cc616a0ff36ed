use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::{emit::EmittedEvent, event::EventEnvelope, ids::ActorId};

/// Per-invocation context handed to every handler and port.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub actor_id: ActorId,
    pub correlation_id: Uuid,
    transaction: Option<TransactionHandle>,
}

/// Handle to an open unit-of-work transaction.
///
/// Clones share the same deferred-event buffer, so handlers nested inside an
/// outer transaction can hand their events to whoever owns the commit.
#[derive(Clone, Debug)]
pub struct TransactionHandle {
    id: Uuid,
    deferred: Arc<Mutex<Vec<EmittedEvent>>>,
}

impl ExecutionContext {
    pub fn new(actor_id: impl Into<ActorId>) -> Self {
        ExecutionContext {
            actor_id: actor_id.into(),
            correlation_id: Uuid::new_v4(),
            transaction: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Returns a copy of this context bound to `transaction`.
    pub fn with_transaction(&self, transaction: TransactionHandle) -> Self {
        ExecutionContext {
            transaction: Some(transaction),
            ..self.clone()
        }
    }

    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    /// Envelope for events published on behalf of this context.
    pub fn envelope(&self) -> EventEnvelope {
        EventEnvelope {
            timestamp: Utc::now(),
            correlation_id: self.correlation_id,
            actor_id: self.actor_id.clone(),
        }
    }
}

impl TransactionHandle {
    pub fn new() -> Self {
        TransactionHandle {
            id: Uuid::new_v4(),
            deferred: Arc::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Buffers events until the owner of this transaction commits.
    pub fn defer_events(&self, events: impl IntoIterator<Item = EmittedEvent>) {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
    }

    pub fn take_deferred(&self) -> Vec<EmittedEvent> {
        std::mem::take(&mut *self.deferred.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for TransactionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for TransactionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TransactionHandle {}
