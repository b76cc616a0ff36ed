use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tablekit_sdk::{
    error::{DomainError, SerializationError},
    event::{EventSet, PublishedEvent},
    ports::EventBus,
};
use tracing::trace;

/// Keeps every published event in memory, in publish order.
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<PublishedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        InMemoryEventBus::default()
    }

    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.event_type.clone())
            .collect()
    }

    /// Published events decoded into `S`; events outside the set are skipped.
    pub fn decoded<S: EventSet>(&self) -> Result<Vec<S>, SerializationError> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(PublishedEvent::decode::<S>)
            .collect()
    }

    pub fn clear(&self) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: PublishedEvent) -> Result<(), DomainError> {
        trace!(event_type = %event.event_type, "published");
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tablekit_sdk::{
        EventSet,
        context::ExecutionContext,
        emit::Emit,
        events::{TableEvent, TableRenamed},
        ids::{RecordId, TableId},
    };

    use super::*;

    #[tokio::test]
    async fn keeps_publish_order() {
        let bus = InMemoryEventBus::new();
        let ctx = ExecutionContext::new("usr1");
        let events = tablekit_sdk::emit![
            TableRenamed {
                table_id: TableId::from("T1"),
                old_name: "Tasks".to_string(),
                new_name: "Chores".to_string(),
            },
            TableRenamed {
                table_id: TableId::from("T1"),
                old_name: "Chores".to_string(),
                new_name: "Todos".to_string(),
            },
        ]
        .unwrap();

        bus.publish_many(
            events
                .into_iter()
                .map(|event| event.into_published(ctx.envelope()))
                .collect(),
        )
        .await
        .unwrap();

        let published = bus.published();
        assert_eq!(bus.event_types(), ["TableRenamed", "TableRenamed"]);
        assert_eq!(published[1].data["newName"], "Todos");
        assert_eq!(published[0].domain_id("table_id"), Some("T1"));
    }

    #[derive(Debug, EventSet)]
    enum RenameEvents {
        TableRenamed(TableRenamed),
    }

    #[tokio::test]
    async fn decodes_published_events_into_a_set() {
        let bus = InMemoryEventBus::new();
        let ctx = ExecutionContext::new("usr1");
        let events = Emit::new()
            .try_event(tablekit_sdk::events::RecordsCreated {
                table_id: TableId::from("T1"),
                record_ids: vec![RecordId::from("R1")],
            })
            .unwrap()
            .try_event(TableRenamed {
                table_id: TableId::from("T1"),
                old_name: "Tasks".to_string(),
                new_name: "Chores".to_string(),
            })
            .unwrap();
        bus.publish_many(
            events
                .into_iter()
                .map(|event| event.into_published(ctx.envelope()))
                .collect(),
        )
        .await
        .unwrap();

        let renames = bus.decoded::<RenameEvents>().unwrap();
        assert_eq!(renames.len(), 1);
        let RenameEvents::TableRenamed(renamed) = &renames[0];
        assert_eq!(renamed.new_name, "Chores");

        let all = bus.decoded::<TableEvent>().unwrap();
        assert!(matches!(all[0], TableEvent::RecordsCreated(_)));
        assert!(matches!(all[1], TableEvent::TableRenamed(_)));
    }
}
