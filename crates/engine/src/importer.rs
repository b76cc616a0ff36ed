//! Structure import.
//!
//! An importer turns an external structure description into the same
//! [`TableInput`]s a hand-written [`CreateTables`](crate::commands::CreateTables)
//! command carries.

use serde::Deserialize;
use tablekit_sdk::{
    domain::{
        field::{Field, FieldKind},
        view::{View, ViewKind},
    },
    error::{DomainError, codes},
    ids::{FieldId, TableId, ViewId},
};

use crate::commands::TableInput;

/// Normalized result of an import.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedStructure {
    pub tables: Vec<TableInput>,
}

pub trait StructureImporter: Send + Sync {
    fn import(&self, source: &str) -> Result<ImportedStructure, DomainError>;
}

/// Reads `.tea` structure files:
///
/// ```json
/// { "tables": [ { "id": "tblA", "name": "Tasks", "fields": [...], "views": [...] } ] }
/// ```
///
/// Missing table, field and view ids are generated; supplied ids are kept so
/// links inside the file can point at tables of the same file.
#[derive(Clone, Copy, Debug, Default)]
pub struct DotTeaImporter;

#[derive(Deserialize)]
struct DotTeaDocument {
    #[serde(default)]
    tables: Vec<DotTeaTable>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DotTeaTable {
    #[serde(default)]
    id: Option<TableId>,
    name: String,
    #[serde(default)]
    fields: Vec<DotTeaField>,
    #[serde(default)]
    views: Vec<DotTeaView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DotTeaField {
    #[serde(default)]
    id: Option<FieldId>,
    name: String,
    #[serde(default)]
    is_primary: bool,
    #[serde(flatten)]
    kind: FieldKind,
}

#[derive(Deserialize)]
struct DotTeaView {
    #[serde(default)]
    id: Option<ViewId>,
    name: String,
    #[serde(default, rename = "type")]
    kind: ViewKind,
}

impl StructureImporter for DotTeaImporter {
    fn import(&self, source: &str) -> Result<ImportedStructure, DomainError> {
        let document: DotTeaDocument = serde_json::from_str(source).map_err(|err| {
            DomainError::validation(format!("Invalid structure file: {err}"))
                .with_code(codes::DOTTEA_INVALID)
        })?;
        if document.tables.is_empty() {
            return Err(DomainError::validation("Structure file contains no tables")
                .with_code(codes::DOTTEA_NO_TABLES));
        }

        let tables = document
            .tables
            .into_iter()
            .map(|table| TableInput {
                id: Some(table.id.unwrap_or_else(TableId::generate)),
                name: table.name,
                fields: table.fields.into_iter().map(DotTeaField::into_field).collect(),
                views: table.views.into_iter().map(DotTeaView::into_view).collect(),
                records: Vec::new(),
            })
            .collect();
        Ok(ImportedStructure { tables })
    }
}

impl DotTeaField {
    fn into_field(self) -> Field {
        Field {
            id: self.id.unwrap_or_else(FieldId::generate),
            name: self.name,
            is_primary: self.is_primary,
            kind: self.kind,
        }
    }
}

impl DotTeaView {
    fn into_view(self) -> View {
        View::new(self.id.unwrap_or_else(ViewId::generate), self.name, self.kind)
    }
}
