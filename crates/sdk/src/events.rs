//! Domain events emitted by the table and record aggregates.

use serde::{Deserialize, Serialize};

use crate::{
    Event, EventSet,
    domain::field::FieldType,
    ids::{BaseId, FieldId, RecordId, TableId, ViewId},
};

#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCreated {
    #[domain_id]
    pub table_id: TableId,
    pub base_id: BaseId,
    pub name: String,
    pub field_ids: Vec<FieldId>,
    pub view_ids: Vec<ViewId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRenamed {
    #[domain_id]
    pub table_id: TableId,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCreated {
    #[domain_id]
    pub table_id: TableId,
    pub field_id: FieldId,
    pub name: String,
    pub field_type: FieldType,
}

#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDuplicated {
    #[domain_id]
    pub table_id: TableId,
    pub source_field_id: FieldId,
    pub field_id: FieldId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRenamed {
    #[domain_id]
    pub table_id: TableId,
    pub field_id: FieldId,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsCreated {
    #[domain_id]
    pub table_id: TableId,
    pub record_ids: Vec<RecordId>,
}

/// Values of one field were copied into another, e.g. by a duplication.
#[derive(Clone, Debug, PartialEq, Eq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFieldValuesCopied {
    #[domain_id]
    pub table_id: TableId,
    pub source_field_id: FieldId,
    pub field_id: FieldId,
    pub record_count: usize,
}

#[derive(Clone, Debug, PartialEq, Event, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsReordered {
    #[domain_id]
    pub table_id: TableId,
    #[domain_id]
    pub view_id: ViewId,
    pub record_ids: Vec<RecordId>,
    pub previous_orders: Vec<Option<f64>>,
    pub orders: Vec<f64>,
}

/// Every event the engine publishes, for consumers decoding
/// [`PublishedEvent`](crate::event::PublishedEvent)s.
#[derive(Clone, Debug, PartialEq, EventSet)]
pub enum TableEvent {
    TableCreated(TableCreated),
    TableRenamed(TableRenamed),
    FieldCreated(FieldCreated),
    FieldDuplicated(FieldDuplicated),
    FieldRenamed(FieldRenamed),
    RecordsCreated(RecordsCreated),
    RecordFieldValuesCopied(RecordFieldValuesCopied),
    RecordsReordered(RecordsReordered),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        emit,
        event::{AsEvent, Event, EventSet},
    };

    #[test]
    fn table_event_decodes_known_types_only() {
        assert_eq!(TableEvent::EVENT_TYPES.len(), 8);
        assert!(TableEvent::EVENT_TYPES.contains(&FieldRenamed::EVENT_TYPE));

        let decoded = TableEvent::from_event(
            TableRenamed::EVENT_TYPE,
            json!({ "tableId": "T1", "oldName": "Tasks", "newName": "Chores" }),
        )
        .unwrap()
        .unwrap();
        let renamed: Option<&TableRenamed> = decoded.as_event();
        assert_eq!(renamed.map(|event| event.new_name.as_str()), Some("Chores"));
        let created: Option<&TableCreated> = decoded.as_event();
        assert!(created.is_none());

        assert!(TableEvent::from_event("ViewDeleted", json!({})).is_none());
        assert!(
            TableEvent::from_event(TableRenamed::EVENT_TYPE, json!({ "tableId": 1 }))
                .unwrap()
                .is_err()
        );
    }

    #[test]
    fn derived_event_metadata() {
        assert_eq!(RecordsReordered::EVENT_TYPE, "RecordsReordered");
        assert_eq!(RecordsReordered::DOMAIN_ID_FIELDS, ["table_id", "view_id"]);

        let event = FieldRenamed {
            table_id: TableId::from("T1"),
            field_id: FieldId::from("F1"),
            old_name: "Name".into(),
            new_name: "Title".into(),
        };
        let ids = event.domain_ids();
        assert_eq!(ids.get("table_id").and_then(|id| id.as_option()), Some("T1"));
    }

    #[test]
    fn emit_macro_collects_events() {
        let emit = emit![
            RecordsCreated {
                table_id: TableId::from("T1"),
                record_ids: vec![RecordId::from("R1")],
            },
            TableRenamed {
                table_id: TableId::from("T1"),
                old_name: "A".into(),
                new_name: "B".into(),
            },
        ]
        .unwrap();

        assert_eq!(emit.len(), 2);
        assert!(emit.contains_event_type::<TableRenamed>());
        assert_eq!(emit.events()[0].data["recordIds"][0], "R1");
    }
}
