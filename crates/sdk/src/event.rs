use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{domain_id::DomainIdValues, error::SerializationError, ids::ActorId};

/// Metadata attached to every event handed to the event bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub actor_id: ActorId,
}

/// An event that has been committed and is being published.
#[derive(Clone, Debug)]
pub struct PublishedEvent {
    pub id: Uuid,
    pub event_type: String,
    pub data: Value,
    pub domain_ids: DomainIdValues,
    pub envelope: EventEnvelope,
}

impl PublishedEvent {
    /// Decodes this event into an [`EventSet`], returning `None` when the
    /// event type is not part of the set.
    pub fn decode<S: EventSet>(&self) -> Option<Result<S, SerializationError>> {
        S::from_event(&self.event_type, self.data.clone())
    }

    /// Returns the value of the given domain id, if present.
    pub fn domain_id(&self, name: &str) -> Option<&str> {
        self.domain_ids.get(name).and_then(|value| value.as_option())
    }
}

/// Trait for individual domain event structs.
///
/// Each event knows its type name and which fields are domain identifiers.
/// Domain IDs identify which aggregate an event belongs to. Reference fields
/// (a foreign table a link points at) are just data, not domain IDs.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Event, Clone, Serialize, Deserialize)]
/// #[event_type("FieldRenamed")]
/// pub struct FieldRenamed {
///     #[domain_id]
///     pub table_id: TableId,
///     pub field_id: FieldId,
///     pub old_name: String,
///     pub new_name: String,
/// }
/// ```
pub trait Event: Serialize + DeserializeOwned + Sized {
    /// The event type name as it appears on the event bus.
    const EVENT_TYPE: &'static str;
    /// The domain id fields.
    const DOMAIN_ID_FIELDS: &'static [&'static str];

    /// Returns the domain ID field names and their values for this event instance.
    fn domain_ids(&self) -> DomainIdValues;
}

/// Trait for a closed set of events a consumer understands.
///
/// This is derived on a user-defined enum that wraps the event types
/// the consumer cares about.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(EventSet)]
/// enum TableEvents {
///     TableCreated(TableCreated),
///     FieldCreated(FieldCreated),
/// }
/// ```
pub trait EventSet: Sized {
    /// Returns the event type names this set can contain.
    const EVENT_TYPES: &'static [&'static str];

    /// Attempt to deserialize an event into this set.
    ///
    /// Returns `None` if the event type is not part of this set,
    /// or `Some(Err(...))` if deserialization fails.
    fn from_event(event_type: &str, data: Value) -> Option<Result<Self, SerializationError>>;
}

/// Used to obtain a reference to a specific event type.
///
/// Returns None if the event type `E` is not held by `self`.
pub trait AsEvent<E> {
    /// Converts this type to a reference to event `E`, or `None` if the type does not hold the event.
    fn as_event(&self) -> Option<&E>;
}
