use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain_id::DomainIdValues,
    error::SerializationError,
    event::{Event, EventEnvelope, PublishedEvent},
};

/// A queue of pending domain events.
///
/// Aggregates append to it on every successful mutation; handlers drain it
/// and hand the events to the event bus once the transaction has committed.
///
/// ```rust,ignore
/// let emit = Emit::new()
///     .try_event(FieldCreated { ... })?
///     .try_event(FieldRenamed { ... })?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Emit {
    events: Vec<EmittedEvent>,
}

/// A serialized event waiting to be published.
#[derive(Clone, Debug)]
pub struct EmittedEvent {
    /// The event type name
    pub event_type: String,
    /// The serialized event data (JSON)
    pub data: Value,
    /// Domain ID values for routing
    pub domain_ids: DomainIdValues,
}

impl Emit {
    /// Create a new empty emit collection.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event, returning an error if serialization fails.
    pub fn try_event<E: Event>(mut self, event: E) -> Result<Self, SerializationError> {
        self.push(event)?;
        Ok(self)
    }

    /// Append an event in place, returning an error if serialization fails.
    pub fn push<E: Event>(&mut self, event: E) -> Result<(), SerializationError> {
        self.events.push(EmittedEvent::try_new(event)?);
        Ok(())
    }

    /// Moves every event of `other` to the end of this queue.
    pub fn extend(&mut self, other: Emit) {
        self.events.extend(other.events);
    }

    /// Returns true if no events will be emitted.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events to be emitted.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Consume and return the collected events.
    pub fn into_events(self) -> Vec<EmittedEvent> {
        self.events
    }

    /// Gets a reference to the events emitted.
    pub fn events(&self) -> &[EmittedEvent] {
        &self.events
    }

    /// Returns true if the emitted events contains this event type.
    pub fn contains_event_type<E: Event>(&self) -> bool {
        self.events
            .iter()
            .any(|event| event.event_type == E::EVENT_TYPE)
    }
}

impl From<Vec<EmittedEvent>> for Emit {
    fn from(events: Vec<EmittedEvent>) -> Self {
        Self { events }
    }
}

impl IntoIterator for Emit {
    type Item = EmittedEvent;
    type IntoIter = std::vec::IntoIter<EmittedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl EmittedEvent {
    pub fn try_new<E: Event>(event: E) -> Result<Self, SerializationError> {
        let domain_ids = event.domain_ids();
        Ok(EmittedEvent {
            event_type: E::EVENT_TYPE.to_string(),
            data: serde_json::to_value(event)?,
            domain_ids,
        })
    }

    pub fn into_published(self, envelope: EventEnvelope) -> PublishedEvent {
        PublishedEvent {
            id: Uuid::new_v4(),
            event_type: self.event_type,
            data: self.data,
            domain_ids: self.domain_ids,
            envelope,
        }
    }
}
