use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::record::link_record_ids,
    error::{DomainError, codes},
    ids::{BaseId, FieldId, TableId},
};

/// A typed column of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Field variants, tagged by `type` on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    SingleLineText,
    LongText,
    Number {
        #[serde(default)]
        precision: u8,
    },
    Checkbox,
    Date,
    SingleSelect {
        #[serde(default)]
        choices: Vec<String>,
    },
    Link(LinkOptions),
    Lookup(LookupOptions),
    Rollup(RollupOptions),
    Formula {
        expression: String,
    },
    AutoNumber,
    CreatedTime,
}

/// The discriminant of a [`FieldKind`], used as a policy key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    SingleLineText,
    LongText,
    Number,
    Checkbox,
    Date,
    SingleSelect,
    Link,
    Lookup,
    Rollup,
    Formula,
    AutoNumber,
    CreatedTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    Scalar,
    Relation,
    Derived,
    Computed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOptions {
    pub foreign_table_id: TableId,
    /// Set for links into another base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_base_id: Option<BaseId>,
    #[serde(default)]
    pub relationship: Relationship,
    #[serde(default)]
    pub is_one_way: bool,
    /// The reciprocal link on the foreign table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetric_field_id: Option<FieldId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    OneOne,
    OneMany,
    ManyOne,
    #[default]
    ManyMany,
}

impl Relationship {
    /// The relationship as seen from the foreign table.
    pub fn reversed(self) -> Self {
        match self {
            Relationship::OneMany => Relationship::ManyOne,
            Relationship::ManyOne => Relationship::OneMany,
            other => other,
        }
    }

    /// Whether a cell on this side holds at most one linked record.
    pub fn is_single_valued(self) -> bool {
        matches!(self, Relationship::OneOne | Relationship::ManyOne)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupOptions {
    pub link_field_id: FieldId,
    pub lookup_field_id: FieldId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupOptions {
    pub link_field_id: FieldId,
    pub lookup_field_id: FieldId,
    pub expression: String,
}

/// A reference from a field to a table that may live outside the batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignTableRef {
    pub base_id: Option<BaseId>,
    pub table_id: TableId,
}

impl ForeignTableRef {
    pub const LOCAL_BASE: &'static str = "local";

    /// Deduplication key; a missing base id means the local base.
    pub fn key(&self) -> (String, TableId) {
        let base = self
            .base_id
            .as_ref()
            .map(|base_id| base_id.to_string())
            .unwrap_or_else(|| Self::LOCAL_BASE.to_string());
        (base, self.table_id.clone())
    }
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::SingleLineText => FieldType::SingleLineText,
            FieldKind::LongText => FieldType::LongText,
            FieldKind::Number { .. } => FieldType::Number,
            FieldKind::Checkbox => FieldType::Checkbox,
            FieldKind::Date => FieldType::Date,
            FieldKind::SingleSelect { .. } => FieldType::SingleSelect,
            FieldKind::Link(_) => FieldType::Link,
            FieldKind::Lookup(_) => FieldType::Lookup,
            FieldKind::Rollup(_) => FieldType::Rollup,
            FieldKind::Formula { .. } => FieldType::Formula,
            FieldKind::AutoNumber => FieldType::AutoNumber,
            FieldKind::CreatedTime => FieldType::CreatedTime,
        }
    }
}

impl FieldType {
    pub fn category(self) -> FieldCategory {
        match self {
            FieldType::SingleLineText
            | FieldType::LongText
            | FieldType::Number
            | FieldType::Checkbox
            | FieldType::Date
            | FieldType::SingleSelect => FieldCategory::Scalar,
            FieldType::Link => FieldCategory::Relation,
            FieldType::Lookup | FieldType::Rollup => FieldCategory::Derived,
            FieldType::Formula | FieldType::AutoNumber | FieldType::CreatedTime => {
                FieldCategory::Computed
            }
        }
    }
}

impl Field {
    pub fn new(id: impl Into<FieldId>, name: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            id: id.into(),
            name: name.into(),
            is_primary: false,
            kind,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn category(&self) -> FieldCategory {
        self.field_type().category()
    }

    /// Whether values of this field are produced by the engine rather than written.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self.category(),
            FieldCategory::Derived | FieldCategory::Computed
        )
    }

    pub fn link_options(&self) -> Option<&LinkOptions> {
        match &self.kind {
            FieldKind::Link(options) => Some(options),
            _ => None,
        }
    }

    pub fn link_options_mut(&mut self) -> Option<&mut LinkOptions> {
        match &mut self.kind {
            FieldKind::Link(options) => Some(options),
            _ => None,
        }
    }

    /// The table this field points at, if it is a relation.
    pub fn foreign_table_ref(&self) -> Option<ForeignTableRef> {
        self.link_options().map(|options| ForeignTableRef {
            base_id: options.foreign_base_id.clone(),
            table_id: options.foreign_table_id.clone(),
        })
    }

    /// Assigns the reciprocal field id of a two-way link that has none yet.
    ///
    /// Field ids are immutable once assigned, so this only ever fills a gap.
    pub fn ensure_symmetric_field_id(&mut self) {
        if let Some(options) = self.link_options_mut()
            && !options.is_one_way
            && options.symmetric_field_id.is_none()
        {
            options.symmetric_field_id = Some(FieldId::generate());
        }
    }

    /// Field ids referenced by a formula expression, written as `{fieldId}`.
    pub fn formula_references(&self) -> Vec<FieldId> {
        let FieldKind::Formula { expression } = &self.kind else {
            return Vec::new();
        };
        let mut refs = Vec::new();
        let mut rest = expression.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                break;
            };
            refs.push(FieldId::from(after[..end].trim()));
            rest = &after[end + 1..];
        }
        refs
    }

    /// Checks a single cell value against this field.
    pub fn validate_value(&self, value: &Value) -> Result<(), DomainError> {
        if self.is_read_only() {
            return Err(self.invalid_value("is computed and cannot be written"));
        }
        if value.is_null() {
            return Ok(());
        }

        let valid = match &self.kind {
            FieldKind::SingleLineText | FieldKind::LongText => value.is_string(),
            FieldKind::Number { .. } => value.is_number(),
            FieldKind::Checkbox => value.is_boolean(),
            FieldKind::Date => value
                .as_str()
                .is_some_and(|date| DateTime::parse_from_rfc3339(date).is_ok()),
            FieldKind::SingleSelect { choices } => value
                .as_str()
                .is_some_and(|choice| choices.iter().any(|c| c == choice)),
            FieldKind::Link(options) => match link_record_ids(value) {
                Some(_) if options.relationship.is_single_valued() => value.is_object(),
                Some(_) => true,
                None => false,
            },
            FieldKind::Lookup(_)
            | FieldKind::Rollup(_)
            | FieldKind::Formula { .. }
            | FieldKind::AutoNumber
            | FieldKind::CreatedTime => false,
        };

        if valid {
            Ok(())
        } else {
            Err(self.invalid_value(format!(
                "does not accept value {value} for type {:?}",
                self.field_type()
            )))
        }
    }

    fn invalid_value(&self, reason: impl std::fmt::Display) -> DomainError {
        DomainError::validation(format!("Field {} ({}) {reason}", self.name, self.id))
            .with_code(codes::RECORD_INVALID_VALUE)
    }
}
