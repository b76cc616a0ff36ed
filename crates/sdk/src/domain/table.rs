use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        field::{Field, FieldCategory, FieldKind, FieldType, ForeignTableRef},
        view::View,
    },
    emit::Emit,
    error::{DomainError, codes},
    event::Event,
    events::{FieldCreated, FieldDuplicated, FieldRenamed, TableCreated, TableRenamed},
    ids::{BaseId, FieldId, TableId, ViewId},
};

/// The table aggregate.
///
/// A table owns its fields, its views and a queue of pending domain events.
/// It is never changed in place: [`Table::update`] hands a draft to a mutator
/// and returns a brand new table, so any other holder of the previous value
/// keeps seeing the previous state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    id: TableId,
    base_id: BaseId,
    name: String,
    fields: Vec<Field>,
    views: Vec<View>,
    #[serde(skip)]
    pending: Emit,
}

/// Editable copy of a table handed to [`Table::update`] mutators.
///
/// Only exposes operations that keep field ids stable; every change appends
/// the event describing it.
#[derive(Debug)]
pub struct TableDraft {
    table_id: TableId,
    name: String,
    fields: Vec<Field>,
    views: Vec<View>,
    emit: Emit,
}

impl Table {
    /// Creates a new table, emitting [`TableCreated`].
    ///
    /// The first field becomes primary when none is flagged, a grid view is
    /// added when no view is given and two-way links get their reciprocal
    /// field id assigned.
    pub fn create(
        id: TableId,
        base_id: BaseId,
        name: impl Into<String>,
        mut fields: Vec<Field>,
        mut views: Vec<View>,
    ) -> Result<Table, DomainError> {
        let name = normalize_name(name.into(), "Table")?;
        if fields.is_empty() {
            return Err(
                DomainError::validation(format!("Table {name} must have at least one field"))
                    .with_code(codes::TABLE_INVALID),
            );
        }
        if !fields.iter().any(|field| field.is_primary) {
            fields[0].is_primary = true;
        }
        for field in &mut fields {
            field.name = normalize_name(std::mem::take(&mut field.name), "Field")?;
            field.ensure_symmetric_field_id();
        }
        if views.is_empty() {
            views.push(View::default_grid());
        }
        check_structure(&id, &fields, &views)?;

        let mut pending = Emit::new();
        pending.push(TableCreated {
            table_id: id.clone(),
            base_id: base_id.clone(),
            name: name.clone(),
            field_ids: fields.iter().map(|field| field.id.clone()).collect(),
            view_ids: views.iter().map(|view| view.id.clone()).collect(),
        })?;

        Ok(Table {
            id,
            base_id,
            name,
            fields,
            views,
            pending,
        })
    }

    /// Applies `mutator` to a draft of this table and returns the new table.
    ///
    /// Events appended by the mutator are queued after any events already
    /// pending on this instance.
    pub fn update<F>(&self, mutator: F) -> Result<Table, DomainError>
    where
        F: FnOnce(&mut TableDraft) -> Result<(), DomainError>,
    {
        let mut draft = TableDraft {
            table_id: self.id.clone(),
            name: self.name.clone(),
            fields: self.fields.clone(),
            views: self.views.clone(),
            emit: Emit::new(),
        };
        mutator(&mut draft)?;
        check_structure(&self.id, &draft.fields, &draft.views)?;

        let mut pending = self.pending.clone();
        pending.extend(draft.emit);

        Ok(Table {
            id: self.id.clone(),
            base_id: self.base_id.clone(),
            name: draft.name,
            fields: draft.fields,
            views: draft.views,
            pending,
        })
    }

    pub fn id(&self) -> &TableId {
        &self.id
    }

    pub fn base_id(&self) -> &BaseId {
        &self.base_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn field(&self, field_id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|field| &field.id == field_id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn primary_field(&self) -> Option<&Field> {
        self.fields.iter().find(|field| field.is_primary)
    }

    pub fn view(&self, view_id: &ViewId) -> Option<&View> {
        self.views.iter().find(|view| &view.id == view_id)
    }

    /// Tables referenced by relation fields, in field order.
    pub fn foreign_table_refs(&self) -> Vec<ForeignTableRef> {
        self.fields
            .iter()
            .filter_map(Field::foreign_table_ref)
            .collect()
    }

    /// Returns `base`, or `"<base> N"` with the smallest free `N`.
    pub fn unique_field_name(&self, base: &str) -> String {
        unique_name(&self.fields, base)
    }

    pub fn pending_events(&self) -> &Emit {
        &self.pending
    }

    /// Drains the pending event queue.
    pub fn pull_events(&mut self) -> Emit {
        std::mem::take(&mut self.pending)
    }

    /// Validates every field against the tables it references.
    ///
    /// `resolve` looks tables up in the assembled set (externally loaded
    /// tables and tables of the same batch).
    pub fn validate_fields<'a, R>(&'a self, resolve: R) -> Result<(), DomainError>
    where
        R: Fn(&TableId) -> Option<&'a Table>,
    {
        for field in &self.fields {
            match &field.kind {
                FieldKind::Link(options) => {
                    if resolve(&options.foreign_table_id).is_none() {
                        return Err(DomainError::not_found(format!(
                            "Field {} links to table {} which does not exist",
                            field.id, options.foreign_table_id
                        ))
                        .with_code(codes::TABLE_NOT_FOUND));
                    }
                    if options.is_one_way && options.symmetric_field_id.is_some() {
                        return Err(invalid_field(field, "is one-way but has a symmetric field"));
                    }
                }
                FieldKind::Lookup(options) => {
                    self.validate_lookup(field, &options.link_field_id, &options.lookup_field_id, &resolve)?
                }
                FieldKind::Rollup(options) => {
                    if options.expression.trim().is_empty() {
                        return Err(invalid_field(field, "has an empty rollup expression"));
                    }
                    self.validate_lookup(field, &options.link_field_id, &options.lookup_field_id, &resolve)?
                }
                FieldKind::Formula { expression } => {
                    if expression.trim().is_empty() {
                        return Err(invalid_field(field, "has an empty expression"));
                    }
                    if let Some(missing) = field
                        .formula_references()
                        .into_iter()
                        .find(|reference| self.field(reference).is_none())
                    {
                        return Err(DomainError::field_not_found(missing));
                    }
                }
                FieldKind::SingleSelect { choices } => {
                    let mut seen = HashSet::new();
                    if let Some(dup) = choices.iter().find(|choice| !seen.insert(choice.as_str())) {
                        return Err(invalid_field(field, format!("repeats choice {dup}")));
                    }
                }
                FieldKind::SingleLineText
                | FieldKind::LongText
                | FieldKind::Number { .. }
                | FieldKind::Checkbox
                | FieldKind::Date
                | FieldKind::AutoNumber
                | FieldKind::CreatedTime => {}
            }
        }
        Ok(())
    }

    fn validate_lookup<'a, R>(
        &self,
        field: &Field,
        link_field_id: &FieldId,
        lookup_field_id: &FieldId,
        resolve: &R,
    ) -> Result<(), DomainError>
    where
        R: Fn(&TableId) -> Option<&'a Table>,
    {
        let link = self
            .field(link_field_id)
            .ok_or_else(|| DomainError::field_not_found(link_field_id))?;
        let options = link
            .link_options()
            .ok_or_else(|| invalid_field(field, format!("uses {link_field_id} which is not a link")))?;
        let foreign = resolve(&options.foreign_table_id)
            .ok_or_else(|| DomainError::table_not_found(&options.foreign_table_id))?;
        if foreign.field(lookup_field_id).is_none() {
            return Err(DomainError::field_not_found(lookup_field_id));
        }
        Ok(())
    }

    /// Validates a record payload against this table's fields.
    pub fn validate_record(&self, values: &IndexMap<FieldId, Value>) -> Result<(), DomainError> {
        for (field_id, value) in values {
            let field = self
                .field(field_id)
                .ok_or_else(|| DomainError::field_not_found(field_id))?;
            field.validate_value(value)?;
        }
        Ok(())
    }
}

impl TableDraft {
    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, field_id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|field| &field.id == field_id)
    }

    /// Appends an event describing a change made outside the helpers below.
    pub fn emit<E: Event>(&mut self, event: E) -> Result<(), DomainError> {
        self.emit.push(event)?;
        Ok(())
    }

    pub fn add_field(&mut self, mut field: Field) -> Result<(), DomainError> {
        field.name = normalize_name(field.name, "Field")?;
        self.ensure_field_free(&field)?;
        if field.is_primary && self.fields.iter().any(|f| f.is_primary) {
            return Err(invalid_field(&field, "cannot become a second primary field"));
        }
        self.emit(FieldCreated {
            table_id: self.table_id.clone(),
            field_id: field.id.clone(),
            name: field.name.clone(),
            field_type: field.field_type(),
        })?;
        self.fields.push(field);
        Ok(())
    }

    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        let name = normalize_name(name.to_string(), "Table")?;
        if name == self.name {
            return Ok(());
        }
        let old_name = std::mem::replace(&mut self.name, name.clone());
        self.emit(TableRenamed {
            table_id: self.table_id.clone(),
            old_name,
            new_name: name,
        })
    }

    pub fn rename_field(&mut self, field_id: &FieldId, name: &str) -> Result<(), DomainError> {
        let name = normalize_name(name.to_string(), "Field")?;
        let index = self
            .fields
            .iter()
            .position(|field| &field.id == field_id)
            .ok_or_else(|| DomainError::field_not_found(field_id))?;
        if self.fields[index].name == name {
            return Ok(());
        }
        if self.fields.iter().any(|field| field.name == name) {
            return Err(duplicate_name(&name));
        }
        let old_name = std::mem::replace(&mut self.fields[index].name, name.clone());
        self.emit(FieldRenamed {
            table_id: self.table_id.clone(),
            field_id: field_id.clone(),
            old_name,
            new_name: name,
        })
    }

    /// Inserts a copy of `source_field_id` right after it.
    pub fn insert_duplicate(
        &mut self,
        source_field_id: &FieldId,
        mut field: Field,
    ) -> Result<(), DomainError> {
        let index = self
            .fields
            .iter()
            .position(|f| &f.id == source_field_id)
            .ok_or_else(|| DomainError::field_not_found(source_field_id))?;
        field.is_primary = false;
        self.ensure_field_free(&field)?;
        self.emit(FieldDuplicated {
            table_id: self.table_id.clone(),
            source_field_id: source_field_id.clone(),
            field_id: field.id.clone(),
            name: field.name.clone(),
        })?;
        self.fields.insert(index + 1, field);
        Ok(())
    }

    fn ensure_field_free(&self, field: &Field) -> Result<(), DomainError> {
        if self.field(&field.id).is_some() {
            return Err(invalid_field(field, "uses an id that already exists"));
        }
        if self.fields.iter().any(|f| f.name == field.name) {
            return Err(duplicate_name(&field.name));
        }
        Ok(())
    }
}

fn unique_name(fields: &[Field], base: &str) -> String {
    let taken = |name: &str| fields.iter().any(|field| field.name == name);
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base} {n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn normalize_name(name: String, what: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{what} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn check_structure(table_id: &TableId, fields: &[Field], views: &[View]) -> Result<(), DomainError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for field in fields {
        if !ids.insert(&field.id) {
            return Err(invalid_field(field, "uses an id that already exists"));
        }
        if !names.insert(field.name.as_str()) {
            return Err(duplicate_name(&field.name));
        }
    }

    let primaries: Vec<_> = fields.iter().filter(|field| field.is_primary).collect();
    match primaries.as_slice() {
        [primary] => {
            let allowed = primary.category() == FieldCategory::Scalar
                || primary.field_type() == FieldType::Formula;
            if !allowed {
                return Err(invalid_field(primary, "cannot be the primary field"));
            }
        }
        _ => {
            return Err(DomainError::validation(format!(
                "Table {table_id} must have exactly one primary field, found {}",
                primaries.len()
            ))
            .with_code(codes::TABLE_INVALID));
        }
    }

    let mut view_ids = HashSet::new();
    if views.is_empty() || !views.iter().all(|view| view_ids.insert(&view.id)) {
        return Err(DomainError::validation(format!(
            "Table {table_id} needs at least one view and unique view ids"
        ))
        .with_code(codes::TABLE_INVALID));
    }
    Ok(())
}

fn invalid_field(field: &Field, reason: impl std::fmt::Display) -> DomainError {
    DomainError::validation(format!("Field {} ({}) {reason}", field.name, field.id))
        .with_code(codes::FIELD_INVALID)
}

fn duplicate_name(name: &str) -> DomainError {
    DomainError::validation(format!("Field name {name} already exists"))
        .with_code(codes::FIELD_DUPLICATE_NAME)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        domain::field::{LinkOptions, LookupOptions, Relationship},
        domain::mutate::TableMutateSpec,
    };

    fn text(id: &str, name: &str) -> Field {
        Field::new(id, name, FieldKind::SingleLineText)
    }

    fn link(id: &str, name: &str, to: &str) -> Field {
        Field::new(
            id,
            name,
            FieldKind::Link(LinkOptions {
                foreign_table_id: TableId::from(to),
                foreign_base_id: None,
                relationship: Relationship::ManyOne,
                is_one_way: false,
                symmetric_field_id: None,
            }),
        )
    }

    fn table(id: &str, fields: Vec<Field>) -> Table {
        Table::create(TableId::from(id), BaseId::from("B1"), id, fields, Vec::new()).unwrap()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    #[test]
    fn create_defaults_primary_and_view() {
        let table = table("T1", vec![text("F1", "Name"), text("F2", "Notes")]);

        assert_eq!(table.primary_field().unwrap().id, FieldId::from("F1"));
        assert_eq!(table.views().len(), 1);
        assert!(table.pending_events().contains_event_type::<TableCreated>());
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let err = Table::create(
            TableId::from("T1"),
            BaseId::from("B1"),
            "People",
            vec![text("F1", "Name"), text("F2", " Name ")],
            Vec::new(),
        )
        .unwrap_err();

        assert_eq!(err.code(), Some(codes::FIELD_DUPLICATE_NAME));
    }

    #[test]
    fn create_rejects_link_as_primary() {
        let err = Table::create(
            TableId::from("T2"),
            BaseId::from("B1"),
            "Tasks",
            vec![link("F2", "Owner", "T1")],
            Vec::new(),
        )
        .unwrap_err();

        assert_eq!(err.code(), Some(codes::FIELD_INVALID));
    }

    #[test]
    fn create_assigns_symmetric_ids() {
        let table = table("T2", vec![text("F1", "Title"), link("F2", "Owner", "T1")]);
        let options = table.field(&FieldId::from("F2")).unwrap().link_options().unwrap();
        assert!(options.symmetric_field_id.is_some());
    }

    // =========================================================================
    // Updates
    // =========================================================================

    #[test]
    fn update_returns_new_instance_and_keeps_old() {
        let original = table("T1", vec![text("F1", "Name")]);
        let spec = TableMutateSpec::AddField {
            field: text("F2", "Email"),
        };

        let updated = original.update(|draft| spec.apply(draft)).unwrap();

        assert_eq!(original.fields().len(), 1);
        assert_eq!(updated.fields().len(), 2);
        assert_eq!(updated.pending_events().len(), 2);
        assert!(updated.pending_events().contains_event_type::<FieldCreated>());
    }

    #[test]
    fn failed_update_leaves_nothing_behind() {
        let original = table("T1", vec![text("F1", "Name")]);
        let err = original
            .update(|draft| draft.add_field(text("F2", "Name")))
            .unwrap_err();

        assert_eq!(err.code(), Some(codes::FIELD_DUPLICATE_NAME));
        assert_eq!(original.pending_events().len(), 1);
    }

    #[test]
    fn rename_to_same_name_emits_nothing() {
        let mut original = table("T1", vec![text("F1", "Name")]);
        original.pull_events();

        let updated = original
            .update(|draft| draft.rename_field(&FieldId::from("F1"), "Name"))
            .unwrap();

        assert!(updated.pending_events().is_empty());
    }

    #[test]
    fn duplicate_is_inserted_after_source() {
        let original = table("T1", vec![text("F1", "Name"), text("F2", "Notes")]);
        let copy = text("F3", "Name (copy)").primary();

        let updated = original
            .update(|draft| draft.insert_duplicate(&FieldId::from("F1"), copy))
            .unwrap();

        let names: Vec<_> = updated.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Name", "Name (copy)", "Notes"]);
        assert!(!updated.fields()[1].is_primary);
    }

    #[test]
    fn unique_field_name_counts_up() {
        let table = table("T1", vec![text("F1", "Name"), text("F2", "Name (copy)")]);
        assert_eq!(table.unique_field_name("Other"), "Other");
        assert_eq!(table.unique_field_name("Name (copy)"), "Name (copy) 1");
    }

    // =========================================================================
    // Cross-table validation
    // =========================================================================

    #[test]
    fn validate_fields_requires_foreign_table() {
        let people = table("T1", vec![text("F1", "Name")]);
        let tasks = table("T2", vec![text("F1", "Title"), link("F2", "Owner", "T1")]);

        assert!(tasks.validate_fields(|_| None).is_err());
        assert!(
            tasks
                .validate_fields(|id| (id == people.id()).then_some(&people))
                .is_ok()
        );
    }

    #[test]
    fn validate_lookup_targets_foreign_field() {
        let people = table("T1", vec![text("F1", "Name")]);
        let lookup = |target: &str| {
            Field::new(
                "F3",
                "Owner name",
                FieldKind::Lookup(LookupOptions {
                    link_field_id: FieldId::from("F2"),
                    lookup_field_id: FieldId::from(target),
                }),
            )
        };
        let resolve = |id: &TableId| (id == people.id()).then_some(&people);

        let ok = table(
            "T2",
            vec![text("F1", "Title"), link("F2", "Owner", "T1"), lookup("F1")],
        );
        assert!(ok.validate_fields(resolve).is_ok());

        let missing = table(
            "T2",
            vec![text("F1", "Title"), link("F2", "Owner", "T1"), lookup("F9")],
        );
        let err = missing.validate_fields(resolve).unwrap_err();
        assert_eq!(err.code(), Some(codes::FIELD_NOT_FOUND));
    }

    #[test]
    fn validate_record_checks_values() {
        let table = table("T1", vec![text("F1", "Name")]);
        let mut values = IndexMap::new();
        values.insert(FieldId::from("F1"), json!("Ada"));
        assert!(table.validate_record(&values).is_ok());

        values.insert(FieldId::from("F9"), json!("?"));
        let err = table.validate_record(&values).unwrap_err();
        assert_eq!(err.code(), Some(codes::FIELD_NOT_FOUND));
    }
}
