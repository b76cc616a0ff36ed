use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::mutate::RecordMutateSpec,
    ids::{FieldId, RecordId, TableId, ViewId},
};

/// A row of a table.
///
/// Records are values: [`TableRecord::update`] returns a new record and
/// leaves the receiver untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub id: RecordId,
    pub table_id: TableId,
    #[serde(default)]
    pub fields: IndexMap<FieldId, Value>,
    /// Manual sort position per view.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub orders: BTreeMap<ViewId, f64>,
}

/// Caller supplied record payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub fields: IndexMap<FieldId, Value>,
}

impl RecordInput {
    pub fn new(id: impl Into<RecordId>) -> Self {
        RecordInput {
            id: Some(id.into()),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, field_id: impl Into<FieldId>, value: Value) -> Self {
        self.fields.insert(field_id.into(), value);
        self
    }

    /// Record ids this payload links to, across all of its cells.
    pub fn linked_record_ids(&self) -> Vec<RecordId> {
        self.fields
            .values()
            .filter_map(link_record_ids)
            .flatten()
            .collect()
    }
}

impl TableRecord {
    pub fn new(id: RecordId, table_id: TableId) -> Self {
        TableRecord {
            id,
            table_id,
            fields: IndexMap::new(),
            orders: BTreeMap::new(),
        }
    }

    /// Builds a record from a payload, generating an id when none was given.
    pub fn from_input(table_id: &TableId, input: RecordInput) -> Self {
        TableRecord {
            id: input.id.unwrap_or_else(RecordId::generate),
            table_id: table_id.clone(),
            fields: input.fields,
            orders: BTreeMap::new(),
        }
    }

    pub fn value(&self, field_id: &FieldId) -> Option<&Value> {
        self.fields.get(field_id)
    }

    pub fn order(&self, view_id: &ViewId) -> Option<f64> {
        self.orders.get(view_id).copied()
    }

    /// Applies a mutate spec, returning the updated record.
    pub fn update(&self, spec: &RecordMutateSpec) -> TableRecord {
        let mut next = self.clone();
        match spec {
            RecordMutateSpec::SetRowOrder { view_id, order } => {
                next.orders.insert(view_id.clone(), *order);
            }
            RecordMutateSpec::SetFieldValue { field_id, value } => {
                if value.is_null() {
                    next.fields.shift_remove(field_id);
                } else {
                    next.fields.insert(field_id.clone(), value.clone());
                }
            }
        }
        next
    }
}

/// Extracts linked record ids from a relation-style cell value.
///
/// Accepts a single `{ "id": ... }` object or an array of them; anything
/// else is not a link value.
pub fn link_record_ids(value: &Value) -> Option<Vec<RecordId>> {
    fn id_of(value: &Value) -> Option<RecordId> {
        value
            .as_object()?
            .get("id")?
            .as_str()
            .map(RecordId::from)
    }

    match value {
        Value::Object(_) => id_of(value).map(|id| vec![id]),
        Value::Array(items) if !items.is_empty() => items.iter().map(id_of).collect(),
        _ => None,
    }
}
