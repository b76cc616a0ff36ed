//! Mutate specs: serializable descriptions of one atomic aggregate change.
//!
//! The same spec value is applied to the in-memory aggregate and then handed
//! to the persistence ports, which replay it against storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{field::Field, table::TableDraft},
    error::DomainError,
    ids::{FieldId, ViewId},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TableMutateSpec {
    AddField {
        field: Field,
    },
    RenameTable {
        name: String,
    },
    RenameField {
        field_id: FieldId,
        name: String,
    },
    /// Inserts `field` right after `source_field_id`.
    DuplicateField {
        source_field_id: FieldId,
        field: Field,
    },
}

impl TableMutateSpec {
    /// Applies this spec to a draft of the table.
    pub fn apply(&self, draft: &mut TableDraft) -> Result<(), DomainError> {
        match self {
            TableMutateSpec::AddField { field } => draft.add_field(field.clone()),
            TableMutateSpec::RenameTable { name } => draft.rename(name),
            TableMutateSpec::RenameField { field_id, name } => draft.rename_field(field_id, name),
            TableMutateSpec::DuplicateField {
                source_field_id,
                field,
            } => draft.insert_duplicate(source_field_id, field.clone()),
        }
    }

    /// The field created by this spec, if any.
    pub fn created_field(&self) -> Option<&Field> {
        match self {
            TableMutateSpec::AddField { field } | TableMutateSpec::DuplicateField { field, .. } => {
                Some(field)
            }
            TableMutateSpec::RenameTable { .. } | TableMutateSpec::RenameField { .. } => None,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            TableMutateSpec::AddField { .. } => "addField",
            TableMutateSpec::RenameTable { .. } => "renameTable",
            TableMutateSpec::RenameField { .. } => "renameField",
            TableMutateSpec::DuplicateField { .. } => "duplicateField",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RecordMutateSpec {
    SetRowOrder { view_id: ViewId, order: f64 },
    SetFieldValue { field_id: FieldId, value: Value },
}
